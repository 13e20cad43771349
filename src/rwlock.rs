//! # RwSpinLock
//!
//! A data-owning reader-writer lock built on [`RawRwSpinLock`]. Any number of
//! readers may hold [`RwSpinReadGuard`]s at once; a writer holding a
//! [`RwSpinWriteGuard`] excludes everyone else. Guards release on drop.
//!
//! A pending writer keeps new readers out, so a steady stream of readers
//! cannot shut writers out for good. Beyond that there is no fairness.
//!
//! ## Safety
//! - Meant for critical sections of a few hundred nanoseconds.
//! - It should **not** be held across system calls or long-running operations.
//! - Not reentrant: taking `write()` while holding a read guard on the same
//!   lock from the same thread spins forever.
//!
//! ## Example
//! ```rust
//! use rw_spinlock::RwSpinLock;
//!
//! static TABLE: RwSpinLock<[u32; 4]> = RwSpinLock::new([0; 4]);
//!
//! fn bump(i: usize) {
//!     TABLE.write()[i] += 1;
//! }
//!
//! fn total() -> u32 {
//!     TABLE.read().iter().sum()
//! }
//!
//! bump(1);
//! bump(3);
//! assert_eq!(total(), 2);
//! ```

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::RawRwSpinLock;

/// A reader-writer spinlock protecting a `T`.
///
/// See the [module-level documentation](self) for examples and caveats.
pub struct RwSpinLock<T: ?Sized> {
    raw: RawRwSpinLock,
    data: UnsafeCell<T>,
}

/// Shared access to the data of a [`RwSpinLock`], released on drop.
pub struct RwSpinReadGuard<'a, T: ?Sized> {
    lock: &'a RwSpinLock<T>,
}

/// Exclusive access to the data of a [`RwSpinLock`], released on drop.
pub struct RwSpinWriteGuard<'a, T: ?Sized> {
    lock: &'a RwSpinLock<T>,
}

impl<T> RwSpinLock<T> {
    /// Creates a new unlocked [`RwSpinLock`] wrapping the given data.
    ///
    /// # Example
    /// ```
    /// use rw_spinlock::RwSpinLock;
    ///
    /// let lock = RwSpinLock::new(123);
    /// assert_eq!(*lock.read(), 123);
    /// ```
    #[inline(always)]
    pub const fn new(data: T) -> Self {
        RwSpinLock {
            raw: RawRwSpinLock::new(),
            data: UnsafeCell::new(data),
        }
    }

    /// Consumes the lock and returns the data.
    #[inline]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> RwSpinLock<T> {
    /// Acquires shared access, spinning until no writer holds or waits for
    /// the lock.
    #[inline]
    pub fn read(&self) -> RwSpinReadGuard<'_, T> {
        self.raw.lock_shared();
        RwSpinReadGuard { lock: self }
    }

    /// Acquires exclusive access, spinning until every reader has left.
    #[inline]
    pub fn write(&self) -> RwSpinWriteGuard<'_, T> {
        self.raw.lock();
        RwSpinWriteGuard { lock: self }
    }

    /// Attempts shared access without waiting.
    ///
    /// Returns `None` if a writer holds or waits for the lock, or if another
    /// thread won the race for the state word.
    #[inline]
    pub fn try_read(&self) -> Option<RwSpinReadGuard<'_, T>> {
        if self.raw.try_lock_shared() {
            Some(RwSpinReadGuard { lock: self })
        } else {
            None
        }
    }

    /// Attempts exclusive access without waiting.
    #[inline]
    pub fn try_write(&self) -> Option<RwSpinWriteGuard<'_, T>> {
        if self.raw.try_lock() {
            Some(RwSpinWriteGuard { lock: self })
        } else {
            None
        }
    }

    /// Runs a closure with shared access to the data.
    ///
    /// # Example
    /// ```
    /// use rw_spinlock::RwSpinLock;
    /// let lock = RwSpinLock::new(vec![1, 2, 3]);
    /// assert_eq!(lock.with_read(|v| v.len()), 3);
    /// ```
    #[inline]
    pub fn with_read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.read();
        f(&*guard)
    }

    /// Runs a closure with exclusive access to the data.
    ///
    /// # Example
    /// ```
    /// use rw_spinlock::RwSpinLock;
    /// let lock = RwSpinLock::new(0i32);
    /// lock.with_write(|data| {
    ///     *data += 1;
    /// });
    /// assert_eq!(*lock.read(), 1);
    /// ```
    #[inline]
    pub fn with_write<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.write();
        f(&mut *guard)
    }

    /// Returns a mutable reference to the data. No locking is needed since
    /// the borrow is already exclusive.
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// The underlying raw lock.
    #[inline(always)]
    pub fn raw(&self) -> &RawRwSpinLock {
        &self.raw
    }

    /// Checks whether the lock is held in either mode.
    #[inline(always)]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    /// Checks whether a writer holds the lock.
    #[inline(always)]
    pub fn is_locked_exclusive(&self) -> bool {
        self.raw.is_locked_exclusive()
    }
}

impl<T: Default> Default for RwSpinLock<T> {
    fn default() -> Self {
        RwSpinLock::new(T::default())
    }
}

impl<T> From<T> for RwSpinLock<T> {
    fn from(data: T) -> Self {
        RwSpinLock::new(data)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for RwSpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("RwSpinLock");
        match self.try_read() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &format_args!("<locked>")),
        };
        d.finish_non_exhaustive()
    }
}

impl<T: ?Sized> Drop for RwSpinReadGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: the guard exists only while a shared acquisition is held.
        unsafe { self.lock.raw.unlock_shared() }
    }
}

impl<T: ?Sized> Drop for RwSpinWriteGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: the guard exists only while the exclusive acquisition is held.
        unsafe { self.lock.raw.unlock() }
    }
}

impl<T: ?Sized> Deref for RwSpinReadGuard<'_, T> {
    type Target = T;
    #[inline(always)]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Deref for RwSpinWriteGuard<'_, T> {
    type Target = T;
    #[inline(always)]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for RwSpinWriteGuard<'_, T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for RwSpinReadGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for RwSpinWriteGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

// Safety: same bounds as std's RwLock. Readers on several threads see `&T`
// at once, so sharing the lock needs `T: Sync` as well as `T: Send`.
unsafe impl<T: ?Sized + Send> Send for RwSpinLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for RwSpinLock<T> {}
unsafe impl<T: ?Sized + Sync> Sync for RwSpinReadGuard<'_, T> {}
unsafe impl<T: ?Sized + Sync> Sync for RwSpinWriteGuard<'_, T> {}


#[cfg(test)]
mod test {
    use crate::RwSpinLock;

    #[test]
    fn test_basic_read_write() {
        let lock = RwSpinLock::new(10);

        {
            let mut guard = lock.write();
            *guard += 5;
            assert_eq!(*guard, 15);
        } // guard dropped here, automatically unlocks

        assert!(!lock.is_locked(), "Lock should be released after guard drop");
        assert_eq!(*lock.read(), 15);
        assert!(lock.raw().state().is_free());
    }

    #[test]
    fn test_many_readers_block_writer() {
        let lock = RwSpinLock::new(String::from("shard"));

        let a = lock.read();
        let b = lock.try_read().expect("second reader should get in");
        assert_eq!(lock.raw().reader_count(), 2);
        assert!(lock.try_write().is_none(), "writer must not coexist with readers");

        drop(a);
        assert!(lock.try_write().is_none());
        drop(b);

        let w = lock.try_write();
        assert!(w.is_some(), "writer should get in once readers left");
        assert!(lock.try_read().is_none(), "reader must not coexist with a writer");
        drop(w);

        assert!(lock.raw().state().is_free());
    }

    #[test]
    fn test_closures_and_into_inner() {
        let mut lock = RwSpinLock::new(vec![1u32, 2]);
        lock.with_write(|v| v.push(3));
        assert_eq!(lock.with_read(|v| v.iter().sum::<u32>()), 6);

        lock.get_mut().push(4);
        assert_eq!(lock.into_inner(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_debug_respects_lock() {
        let lock = RwSpinLock::new(5);
        assert!(format!("{lock:?}").contains('5'));

        let _w = lock.write();
        assert!(format!("{lock:?}").contains("<locked>"));
    }

    #[test]
    fn test_unsized_slice() {
        let lock: &RwSpinLock<[u8]> = &RwSpinLock::new([1u8, 2, 3]);
        lock.write()[0] = 9;
        assert_eq!(&*lock.read(), &[9, 2, 3]);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let lock = Arc::new(RwSpinLock::new(0usize));
        let mut handles = vec![];

        for i in 0..8 {
            let lock_cloned = lock.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..10_000 {
                    if i % 2 == 0 {
                        *lock_cloned.write() += 1;
                    } else {
                        let v = *lock_cloned.read();
                        assert!(v <= 4 * 10_000);
                    }
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        let final_value = *lock.read();
        assert_eq!(final_value, 4 * 10_000, "Counter should match total increments");
        assert!(lock.raw().state().is_free());
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_writer_sees_consistent_pairs() {
        use std::sync::Arc;
        use std::thread;

        // writers keep the two halves equal; readers must never see them differ
        let lock = Arc::new(RwSpinLock::new((0u64, 0u64)));

        let writers: Vec<_> = (0..2)
            .map(|_| {
                let lock = lock.clone();
                thread::spawn(move || {
                    for _ in 0..5_000 {
                        let mut g = lock.write();
                        g.0 += 1;
                        g.1 += 1;
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let lock = lock.clone();
                thread::spawn(move || {
                    for _ in 0..5_000 {
                        let g = lock.read();
                        assert_eq!(g.0, g.1, "reader saw a torn write");
                    }
                })
            })
            .collect();

        for h in writers.into_iter().chain(readers) {
            h.join().unwrap();
        }

        assert_eq!(*lock.read(), (10_000, 10_000));
    }
}
