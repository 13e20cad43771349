//! # RawRwSpinLock
//!
//! The bare reader-writer spinlock: one [`AtomicU32`] and nothing else. It
//! guards no data of its own; the embedding structure (typically one shard of
//! a partitioned map) owns whatever the lock protects. For a data-owning
//! wrapper see [`RwSpinLock`](crate::RwSpinLock).
//!
//! ## Protocol
//! - Readers increment the reader count with a CAS, refused while a writer
//!   holds the lock, while a writer is pending, or when the count is saturated.
//! - A writer takes the lock with a CAS from "no writer, no readers" to
//!   [`EXCLUSIVE`]. While readers are present it raises [`WRITER_PENDING`]
//!   so no new reader gets in, and polls until the readers drain.
//! - The last reader out, seeing only the pending flag left, tries to return
//!   the word to free.
//!
//! Acquisitions use `Acquire` on the successful CAS and releases use
//! `Release`, so each critical section happens-before the next one that
//! acquires the lock.
//!
//! ## Contract
//! - Not reentrant. A thread holding either kind of acquisition must release
//!   it before acquiring again.
//! - [`unlock_shared`](RawRwSpinLock::unlock_shared) and
//!   [`unlock`](RawRwSpinLock::unlock) must match an acquisition the caller
//!   actually holds. Nothing checks this; violating it corrupts the word.
//! - No fairness beyond the best-effort writer preference of the pending flag.
//!
//! ## Example
//! ```rust
//! use rw_spinlock::RawRwSpinLock;
//!
//! let lock = RawRwSpinLock::new();
//!
//! lock.lock_shared();
//! assert!(lock.try_lock_shared());
//! assert!(!lock.try_lock());
//! unsafe {
//!     lock.unlock_shared();
//!     lock.unlock_shared();
//! }
//!
//! lock.lock();
//! unsafe { lock.unlock() };
//! assert!(lock.state().is_free());
//! ```

use core::sync::atomic::{
    AtomicU32,
    Ordering::{Acquire, Relaxed, Release},
};

use crate::state::{State, EXCLUSIVE, FREE};
use crate::BackOff;

/// A word-sized reader-writer spinlock with writer preference.
///
/// See the [module-level documentation](self) for the protocol and contract.
#[derive(Default)]
pub struct RawRwSpinLock {
    state: AtomicU32,
}

impl RawRwSpinLock {
    /// Creates a free lock.
    #[inline(always)]
    pub const fn new() -> Self {
        RawRwSpinLock {
            state: AtomicU32::new(FREE),
        }
    }

    /// Attempts one shared acquisition without waiting.
    ///
    /// Returns `false` if a writer holds or waits for the lock, if the reader
    /// count is saturated, or if the CAS loses a race. It does not retry.
    #[inline]
    pub fn try_lock_shared(&self) -> bool {
        let word = self.state.load(Relaxed);
        let st = State::decode(word);

        if !st.admits_reader() {
            return false;
        }

        self.state
            .compare_exchange(word, st.with_reader().encode(), Acquire, Relaxed)
            .is_ok()
    }

    /// Acquires the lock shared, spinning until it succeeds.
    #[inline]
    pub fn lock_shared(&self) {
        if self.try_lock_shared() {
            return;
        }
        self.lock_shared_slow();
    }

    #[cold]
    fn lock_shared_slow(&self) {
        let backoff = BackOff::new();

        loop {
            let word = self.state.load(Relaxed);
            let st = State::decode(word);

            if st.admits_reader()
                && self
                    .state
                    .compare_exchange(word, st.with_reader().encode(), Acquire, Relaxed)
                    .is_ok()
            {
                return;
            }

            backoff.wait();
        }
    }

    /// Releases one shared acquisition.
    ///
    /// If this was the last reader and a writer is pending, the word is
    /// returned to free. That cleanup is retried only while the word still
    /// reads "pending, no readers"; once anything else shows up it is left to
    /// whoever changed it (the polling writer takes the lock from the pending
    /// state directly).
    ///
    /// # Safety
    /// The caller must hold a shared acquisition of this lock, obtained by
    /// [`lock_shared`](Self::lock_shared) or a successful
    /// [`try_lock_shared`](Self::try_lock_shared) and not yet released.
    #[inline]
    pub unsafe fn unlock_shared(&self) {
        let drained = State::drained_with_writer_pending().encode();
        let mut word = self.state.fetch_sub(1, Release).wrapping_sub(1);

        while word == drained {
            match self
                .state
                .compare_exchange_weak(word, FREE, Relaxed, Relaxed)
            {
                Ok(_) => break,
                Err(current) => word = current,
            }
        }
    }

    /// Attempts the exclusive acquisition without waiting.
    ///
    /// Fails if a writer holds the lock or any reader does. A lone pending
    /// flag does not block it.
    #[inline]
    pub fn try_lock(&self) -> bool {
        let word = self.state.load(Relaxed);

        if !State::decode(word).admits_writer() {
            return false;
        }

        self.state
            .compare_exchange(word, EXCLUSIVE, Acquire, Relaxed)
            .is_ok()
    }

    /// Acquires the lock exclusively, spinning until it succeeds.
    ///
    /// While readers hold the lock the writer raises the pending flag, which
    /// keeps new readers out until it gets in.
    #[inline]
    pub fn lock(&self) {
        if self.try_lock() {
            return;
        }
        self.lock_slow();
    }

    #[cold]
    fn lock_slow(&self) {
        let backoff = BackOff::new();

        loop {
            let word = self.state.load(Relaxed);
            let st = State::decode(word);

            if st.exclusive {
                // another writer holds it
            } else if st.admits_writer() {
                if self
                    .state
                    .compare_exchange(word, EXCLUSIVE, Acquire, Relaxed)
                    .is_ok()
                {
                    return;
                }
            } else if !st.writer_pending {
                // best effort; a lost race is retried on the next round
                let _ = self.state.compare_exchange(
                    word,
                    st.with_writer_pending().encode(),
                    Relaxed,
                    Relaxed,
                );
            }

            backoff.wait();
        }
    }

    /// Releases the exclusive acquisition, returning the word to free.
    ///
    /// # Safety
    /// The caller must hold the exclusive acquisition of this lock, obtained
    /// by [`lock`](Self::lock) or a successful [`try_lock`](Self::try_lock)
    /// and not yet released.
    #[inline]
    pub unsafe fn unlock(&self) {
        self.state.store(FREE, Release);
    }

    /// Relaxed snapshot of the decoded state word.
    ///
    /// Only a hint under concurrency; it may be stale by the time it returns.
    #[inline]
    pub fn state(&self) -> State {
        State::decode(self.state.load(Relaxed))
    }

    /// Checks whether the lock is held in either mode.
    #[inline]
    pub fn is_locked(&self) -> bool {
        let st = self.state();
        st.exclusive || st.readers != 0
    }

    /// Checks whether a writer holds the lock.
    #[inline]
    pub fn is_locked_exclusive(&self) -> bool {
        self.state().exclusive
    }

    /// Checks whether a writer has flagged itself as waiting.
    #[inline]
    pub fn is_writer_pending(&self) -> bool {
        self.state().writer_pending
    }

    /// Number of shared holders right now.
    #[inline]
    pub fn reader_count(&self) -> u32 {
        self.state().readers
    }
}

impl core::fmt::Debug for RawRwSpinLock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RawRwSpinLock")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(feature = "lock_api")]
unsafe impl lock_api::RawRwLock for RawRwSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawRwSpinLock::new();

    type GuardMarker = lock_api::GuardSend;

    #[inline]
    fn lock_shared(&self) {
        RawRwSpinLock::lock_shared(self)
    }

    #[inline]
    fn try_lock_shared(&self) -> bool {
        RawRwSpinLock::try_lock_shared(self)
    }

    #[inline]
    unsafe fn unlock_shared(&self) {
        RawRwSpinLock::unlock_shared(self)
    }

    #[inline]
    fn lock_exclusive(&self) {
        RawRwSpinLock::lock(self)
    }

    #[inline]
    fn try_lock_exclusive(&self) -> bool {
        RawRwSpinLock::try_lock(self)
    }

    #[inline]
    unsafe fn unlock_exclusive(&self) {
        RawRwSpinLock::unlock(self)
    }

    #[inline]
    fn is_locked(&self) -> bool {
        RawRwSpinLock::is_locked(self)
    }

    #[inline]
    fn is_locked_exclusive(&self) -> bool {
        RawRwSpinLock::is_locked_exclusive(self)
    }
}

/// [`lock_api::RwLock`] over [`RawRwSpinLock`].
#[cfg(feature = "lock_api")]
pub type RwLock<T> = lock_api::RwLock<RawRwSpinLock, T>;
#[cfg(feature = "lock_api")]
pub type RwLockReadGuard<'a, T> = lock_api::RwLockReadGuard<'a, RawRwSpinLock, T>;
#[cfg(feature = "lock_api")]
pub type RwLockWriteGuard<'a, T> = lock_api::RwLockWriteGuard<'a, RawRwSpinLock, T>;
