//! # BackOff
//!
//! Spin-then-sleep backoff for the lock's acquisition loops.
//!
//! The policy is a pure function of the attempt counter of the *current*
//! spin loop ([`yield_k`]): early attempts issue a CPU pause via
//! [`core::hint::spin_loop`], and once the counter reaches [`SPIN_LIMIT`] the
//! thread is put to sleep briefly so a long wait stops burning a core.
//! [`BackOff`] simply carries that counter for one loop.
//!
//! ## Example
//! ```rust
//! use rw_spinlock::BackOff;
//!
//! let backoff = BackOff::new();
//!
//! // Example of use in a spin loop
//! loop {
//!     if try_acquire_lock() {
//!         break;
//!     }
//!     backoff.wait();
//! }
//!
//! fn try_acquire_lock() -> bool {
//!     // pseudo lock acquisition
//!     true
//! }
//! ```
//!
//! ## Feature flags
//! - **`std`**: past the spin limit the thread sleeps via
//!   [`std::thread::sleep`]. Without `std` there is no scheduler to hand
//!   the core to, so it keeps pausing.

use core::{cell::Cell, hint::spin_loop};

/// Attempts below this count pause the CPU; later attempts sleep.
pub const SPIN_LIMIT: u32 = 49_152;

/// How long one escalated attempt sleeps for.
#[cfg(feature = "std")]
const SLEEP: std::time::Duration = std::time::Duration::from_micros(1);

/// Yields the processor according to attempt `k` of a spin loop.
///
/// Safe to call from any number of threads; it has no state and no effect
/// besides the pause or sleep.
#[inline]
pub fn yield_k(k: u32) {
    if k < SPIN_LIMIT {
        spin_loop();
    } else {
        sleep();
    }
}

#[cfg(feature = "std")]
#[cold]
fn sleep() {
    std::thread::sleep(SLEEP);
}

#[cfg(not(feature = "std"))]
#[inline]
fn sleep() {
    spin_loop();
}

/// Attempt counter for a single spin loop.
///
/// Create one per acquisition attempt; every failed attempt calls
/// [`wait`](BackOff::wait), which backs off according to the attempts made so
/// far and then counts one more.
///
/// # Examples
///
/// ```rust
/// use rw_spinlock::BackOff;
///
/// let backoff = BackOff::new();
/// assert_eq!(backoff.attempts(), 0);
/// backoff.wait();
/// backoff.wait();
/// assert_eq!(backoff.attempts(), 2);
/// assert!(!backoff.is_sleeping());
/// ```
#[derive(Debug, Default)]
pub struct BackOff {
    attempt: Cell<u32>,
}

impl BackOff {
    /// Creates a new [`BackOff`] at attempt zero.
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            attempt: Cell::new(0),
        }
    }

    /// Backs off once and records the attempt.
    ///
    /// The counter saturates rather than wrapping, so a waiter that has
    /// escalated to sleeping never drops back to pure spinning.
    #[inline(always)]
    pub fn wait(&self) {
        let k = self.attempt.get();

        if k == SPIN_LIMIT {
            log::trace!("spin loop escalated to sleeping after {k} attempts");
        }

        yield_k(k);
        self.attempt.set(k.saturating_add(1));
    }

    /// Number of attempts backed off so far.
    #[inline(always)]
    pub fn attempts(&self) -> u32 {
        self.attempt.get()
    }

    /// Whether the next [`wait`](BackOff::wait) sleeps instead of pausing.
    #[inline(always)]
    pub fn is_sleeping(&self) -> bool {
        self.attempt.get() >= SPIN_LIMIT
    }

    /// Starts a fresh acquisition attempt.
    #[inline(always)]
    pub fn reset(&self) {
        self.attempt.set(0);
    }
}
