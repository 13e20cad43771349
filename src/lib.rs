//! # rw-spinlock 🌀
//!
//! A compact, allocation-free, **`no_std`-compatible** reader-writer spinlock
//! for critical sections measured in nanoseconds, such as the per-shard locks
//! of a partitioned hash map.
//!
//! The crate includes:
//!
//! - [`RawRwSpinLock`] — the lock itself: one `u32` of state, six operations.
//! - [`RwSpinLock<T>`] — a data-owning wrapper with RAII read/write guards.
//! - [`BackOff`] — the spin-then-sleep policy every wait loop uses.
//! - [`Sharded<T>`] — one lock per partition, selected by key hash (`std` only).
//!
//! ## 🚀 Quick Example
//!
//! ```rust
//! use rw_spinlock::RwSpinLock;
//!
//! let lock = RwSpinLock::new(0);
//! {
//!     let r1 = lock.read();
//!     let r2 = lock.read(); // readers share
//!     assert_eq!(*r1 + *r2, 0);
//! }
//! *lock.write() += 1;
//! assert_eq!(*lock.read(), 1);
//! ```
//!
//! ## 🧠 Design
//!
//! ### State word
//!
//! The top bit marks an exclusive holder, the next bit a writer waiting for
//! readers to drain, and the remaining 30 bits count readers. See [`state`].
//! A saturated reader count refuses further readers instead of overflowing.
//!
//! ### Writer preference
//!
//! A writer that finds readers inside raises the pending bit. New readers
//! refuse to join while it is set, so the writer gets in as soon as the
//! current readers leave.
//!
//! ### BackOff
//!
//! Failed attempts pause the CPU with [`core::hint::spin_loop()`]; after
//! [`backoff::SPIN_LIMIT`] attempts in one loop the thread sleeps for a
//! microsecond between retries (with `std`).
//!
//! ## ⚠️ Safety & Usage Notes
//!
//! - Use it for **short critical sections** only.
//! - Never hold it during blocking or long-running operations.
//! - Not reentrant, in either mode.
//! - The raw unlock operations are `unsafe`: releasing an acquisition you do
//!   not hold corrupts the state word and is not detected.
//!
//! ## Feature flags
//!
//! - **`std`** (default) — sleeping backoff and the [`Sharded`] container.
//! - **`lock_api`** — implements [`lock_api::RawRwLock`] for [`RawRwSpinLock`]
//!   and exports `RwLock`, `RwLockReadGuard`, `RwLockWriteGuard` aliases.
//! - **`cli`** — builds the `rw-spinlock-stress` binary.

#![cfg_attr(not(any(feature = "std", test)), no_std)]

pub mod backoff;
pub mod raw;
pub mod rwlock;
#[cfg(feature = "std")]
pub mod shard;
pub mod state;

pub use backoff::BackOff;
pub use raw::RawRwSpinLock;
#[cfg(feature = "lock_api")]
pub use raw::{RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use rwlock::{RwSpinLock, RwSpinReadGuard, RwSpinWriteGuard};
#[cfg(feature = "std")]
pub use shard::Sharded;
pub use state::State;
