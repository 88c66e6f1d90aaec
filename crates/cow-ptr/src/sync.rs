//! Synchronization primitives used by the lock-free parts of the crate.
//!
//! `AtomicFlag` and `SharedPayload` import their atomics from here instead of
//! `std` so that building with `RUSTFLAGS="--cfg loom"` swaps them for
//! `loom`'s model-checked versions. Spin-waiting goes through [`SpinWait`]
//! for the same reason: a bare spin loop never yields to the `loom`
//! scheduler and would hang the model.

#[cfg(loom)]
pub(crate) use loom::sync::atomic::{fence, AtomicU8, AtomicUsize, Ordering};

#[cfg(not(loom))]
pub(crate) use std::sync::atomic::{fence, AtomicU8, AtomicUsize, Ordering};

/// Exponential backoff for the short waits of the ownership protocol.
///
/// Wraps `crossbeam`'s `Backoff`, which spins with `PAUSE` hints for a few
/// rounds and then starts yielding the thread, so a waiter stuck behind a
/// long deep copy does not burn a whole core.
pub(crate) struct SpinWait {
    #[cfg(not(loom))]
    backoff: crossbeam::utils::Backoff,
}

impl SpinWait {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            #[cfg(not(loom))]
            backoff: crossbeam::utils::Backoff::new(),
        }
    }

    /// Wait a little before the caller re-checks its condition.
    #[inline]
    pub(crate) fn snooze(&self) {
        #[cfg(not(loom))]
        self.backoff.snooze();
        #[cfg(loom)]
        loom::thread::yield_now();
    }
}
