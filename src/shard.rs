//! # Sharded
//!
//! A fixed array of independently locked partitions. A key is hashed and the
//! hash reduced modulo the shard count to pick its shard; only that shard's
//! [`RwSpinLock`] is taken. Each lock sits in its own cache line so threads
//! working on neighbouring shards do not false-share.
//!
//! The container knows nothing about what a shard holds; it is usually a
//! plain single-threaded map.
//!
//! ## Example
//! ```rust
//! use std::collections::HashMap;
//! use rw_spinlock::Sharded;
//!
//! let words: Sharded<HashMap<&str, usize>> = Sharded::new(16, HashMap::new);
//!
//! for w in ["a", "b", "a"] {
//!     *words.write(&w).entry(w).or_default() += 1;
//! }
//!
//! assert_eq!(words.read(&"a").get("a"), Some(&2));
//! assert_eq!(words.fold_read(0, |n, m| n + m.len()), 2);
//! ```

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use crossbeam_utils::CachePadded;

use crate::{RwSpinLock, RwSpinReadGuard, RwSpinWriteGuard};

/// A set of `T`s, each behind its own [`RwSpinLock`], addressed by key hash.
pub struct Sharded<T, S = RandomState> {
    shards: Box<[CachePadded<RwSpinLock<T>>]>,
    hasher: S,
}

impl<T> Sharded<T> {
    /// Creates `shards` partitions, each initialised by `init`.
    ///
    /// A shard count of zero is raised to one.
    pub fn new(shards: usize, init: impl FnMut() -> T) -> Self {
        Self::with_hasher(shards, RandomState::new(), init)
    }

    /// Creates as many shards as the square of the logical CPU count.
    ///
    /// With one shard per thread pair, two threads rarely meet on the same
    /// lock.
    pub fn with_default_shards(init: impl FnMut() -> T) -> Self {
        let cpus = num_cpus::get();
        Self::new(cpus * cpus, init)
    }
}

impl<T, S: BuildHasher> Sharded<T, S> {
    /// Creates `shards` partitions addressed through `hasher`.
    pub fn with_hasher(shards: usize, hasher: S, mut init: impl FnMut() -> T) -> Self {
        let count = shards.max(1);
        log::debug!("creating sharded container with {count} shards");

        let shards = (0..count)
            .map(|_| CachePadded::new(RwSpinLock::new(init())))
            .collect();

        Sharded { shards, hasher }
    }

    /// Index of the shard responsible for `key`.
    #[inline]
    pub fn shard_index<K: Hash + ?Sized>(&self, key: &K) -> usize {
        (self.hasher.hash_one(key) % self.shards.len() as u64) as usize
    }

    /// The lock guarding `key`'s shard.
    #[inline]
    pub fn shard_for<K: Hash + ?Sized>(&self, key: &K) -> &RwSpinLock<T> {
        &self.shards[self.shard_index(key)]
    }

    /// Shared access to `key`'s shard.
    #[inline]
    pub fn read<K: Hash + ?Sized>(&self, key: &K) -> RwSpinReadGuard<'_, T> {
        self.shard_for(key).read()
    }

    /// Exclusive access to `key`'s shard.
    #[inline]
    pub fn write<K: Hash + ?Sized>(&self, key: &K) -> RwSpinWriteGuard<'_, T> {
        self.shard_for(key).write()
    }
}

impl<T, S> Sharded<T, S> {
    /// Number of shards.
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// The shard at `index`, if any.
    #[inline]
    pub fn shard(&self, index: usize) -> Option<&RwSpinLock<T>> {
        self.shards.get(index).map(|s| &**s)
    }

    /// Iterates over every shard lock in index order.
    pub fn iter(&self) -> impl Iterator<Item = &RwSpinLock<T>> + '_ {
        self.shards.iter().map(|s| &**s)
    }

    /// Folds over all shards, holding each one shared only while visiting it.
    ///
    /// The result is not a snapshot: writers may change shards already
    /// visited or not yet reached.
    pub fn fold_read<B>(&self, init: B, mut f: impl FnMut(B, &T) -> B) -> B {
        self.iter().fold(init, |acc, shard| f(acc, &*shard.read()))
    }

    /// Consumes the container, returning the shards in index order.
    pub fn into_shards(self) -> Vec<T> {
        self.shards
            .into_vec()
            .into_iter()
            .map(|s| CachePadded::into_inner(s).into_inner())
            .collect()
    }
}

impl<T: Default> Default for Sharded<T> {
    fn default() -> Self {
        Self::with_default_shards(T::default)
    }
}

impl<T, S> core::fmt::Debug for Sharded<T, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sharded")
            .field("shards", &self.shards.len())
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::hash::BuildHasherDefault;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_zero_shards_raised_to_one() {
        let s: Sharded<u32> = Sharded::new(0, || 0);
        assert_eq!(s.shard_count(), 1);
        assert_eq!(s.shard_index("anything"), 0);
    }

    #[test]
    fn test_default_shards_follow_cpu_count() {
        let s: Sharded<u32> = Sharded::default();
        let cpus = num_cpus::get();
        assert_eq!(s.shard_count(), cpus * cpus);
    }

    #[test]
    fn test_shard_index_is_hash_mod_count() {
        let hasher = BuildHasherDefault::<std::collections::hash_map::DefaultHasher>::default();
        let s = Sharded::with_hasher(7, hasher.clone(), || 0u8);

        for key in ["alpha", "beta", "gamma", "delta"] {
            let expected = (hasher.hash_one(key) % 7) as usize;
            assert_eq!(s.shard_index(key), expected);
            assert!(core::ptr::eq(s.shard_for(key), s.shard(expected).unwrap()));
        }
        assert!(s.shard(7).is_none());
    }

    #[test]
    fn test_shards_are_independent() {
        let s: Sharded<u32> = Sharded::new(2, || 0);
        let _w = s.shard(0).unwrap().write();
        assert!(s.shard(1).unwrap().try_write().is_some());
        assert!(s.shard(0).unwrap().try_read().is_none());
    }

    #[test]
    fn test_shard_locks_do_not_share_cache_lines() {
        let s: Sharded<u8> = Sharded::new(2, || 0);
        let a = s.shard(0).unwrap() as *const _ as usize;
        let b = s.shard(1).unwrap() as *const _ as usize;
        assert!(b - a >= core::mem::align_of::<CachePadded<u8>>());
    }

    #[test]
    fn test_concurrent_word_count() {
        const THREADS: usize = 8;
        const WORDS: [&str; 6] = ["the", "quick", "brown", "fox", "the", "lazy"];
        const ROUNDS: usize = 2_000;

        let counts: Arc<Sharded<HashMap<&'static str, usize>>> =
            Arc::new(Sharded::new(THREADS * THREADS, HashMap::new));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let counts = counts.clone();
                thread::spawn(move || {
                    for _ in 0..ROUNDS {
                        for w in WORDS {
                            *counts.write(w).entry(w).or_default() += 1;
                            let _ = counts.read(w).contains_key(&w[1..]);
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counts.read("the").get("the"), Some(&(2 * THREADS * ROUNDS)));
        assert_eq!(counts.read("fox").get("fox"), Some(&(THREADS * ROUNDS)));

        let distinct = counts.fold_read(0, |n, m| n + m.len());
        assert_eq!(distinct, 5);
        assert!(counts.iter().all(|l| l.raw().state().is_free()));

        let total: usize = Arc::try_unwrap(counts)
            .unwrap()
            .into_shards()
            .iter()
            .flat_map(|m| m.values())
            .sum();
        assert_eq!(total, THREADS * ROUNDS * WORDS.len());
    }
}
