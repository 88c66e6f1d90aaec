//! Lock-free ownership flag built on a three-state atomic.
//!
//! # State machine
//!
//! ```text
//!             CAS (winner)              store(Release)
//!  NotOwner ───────────────▶ Acquiring ───────────────▶ Owner
//!      ▲                        │
//!      └────────────────────────┘
//!        store(Release) when the detach fails or unwinds
//! ```
//!
//! Exactly one caller can move the flag out of `NotOwner`, so exactly one
//! caller runs the detach. Callers that find `AcquiringOwnership` wait with
//! acquire loads until the state changes. Once they see `Owner`, the
//! release store that published it guarantees they also see everything the
//! detach wrote, in particular the handle's new payload pointer.
//!
//! After ownership is acquired, every further acquisition is a single
//! acquire load of an uncontended cache line.

use std::fmt;

use super::{run_detach, OwnershipFlag, OwnershipStatus};
use crate::metrics;
use crate::sync::{AtomicU8, Ordering, SpinWait};
use crate::tracing::internal::log_detach_contended;

const NOT_OWNER: u8 = OwnershipStatus::NotOwner as u8;
const ACQUIRING: u8 = OwnershipStatus::AcquiringOwnership as u8;
const OWNER: u8 = OwnershipStatus::Owner as u8;

/// A lock-free ownership flag.
///
/// Contention is only possible while the first detach of a handle is in
/// flight; the steady state costs one atomic load. Waiters spin with
/// exponential backoff, which suits the short critical section of a typical
/// payload copy.
///
/// # Examples
///
/// ```
/// use cow_ptr::flag::{AtomicFlag, OwnershipFlag};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let flag = AtomicFlag::new(false);
/// let copies = AtomicUsize::new(0);
///
/// std::thread::scope(|s| {
///     for _ in 0..4 {
///         s.spawn(|| {
///             flag.acquire_ownership_once(|| {
///                 copies.fetch_add(1, Ordering::Relaxed);
///             });
///         });
///     }
/// });
///
/// assert_eq!(copies.load(Ordering::Relaxed), 1);
/// ```
pub struct AtomicFlag {
    status: AtomicU8,
}

/// Puts the flag back to `NotOwner` unless the detach succeeded.
struct ResetOnFailure<'a> {
    status: &'a AtomicU8,
}

impl Drop for ResetOnFailure<'_> {
    fn drop(&mut self) {
        // Release so that waiters retrying the CAS see a consistent handle.
        self.status.store(NOT_OWNER, Ordering::Release);
    }
}

impl AtomicFlag {
    /// Try to move the flag from `NotOwner` to `AcquiringOwnership`.
    ///
    /// Returns true if this caller won and must run the detach, false once
    /// the flag is `Owner`. Waits while another caller holds the
    /// `AcquiringOwnership` state, and competes again if that caller fails.
    fn claim(&self) -> bool {
        let mut waited = false;
        loop {
            // Acquire on both paths: on failure we may observe `Owner`, and
            // must then see the payload the winning detach installed.
            match self.status.compare_exchange(
                NOT_OWNER,
                ACQUIRING,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(OWNER) => return false,
                Err(_) => {
                    if !waited {
                        waited = true;
                        metrics::record_contended_wait();
                        log_detach_contended(Self::STRATEGY);
                    }
                    self.wait_while_acquiring();
                }
            }
        }
    }

    /// Spin until no acquisition is in progress and return the state then.
    fn wait_while_acquiring(&self) -> u8 {
        let wait = SpinWait::new();
        loop {
            // Pairs with the Release store that ends an acquisition.
            let status = self.status.load(Ordering::Acquire);
            if status != ACQUIRING {
                return status;
            }
            wait.snooze();
        }
    }
}

impl OwnershipFlag for AtomicFlag {
    const STRATEGY: &'static str = "atomic";

    #[inline]
    fn new(initially_owned: bool) -> Self {
        Self {
            status: AtomicU8::new(OwnershipStatus::from_owned(initially_owned) as u8),
        }
    }

    #[inline]
    fn status(&self) -> OwnershipStatus {
        OwnershipStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Set the state, first waiting out any acquisition in progress so that
    /// it cannot be overwritten halfway through.
    fn set_ownership(&self, owned: bool) {
        let desired = OwnershipStatus::from_owned(owned) as u8;
        let mut current = self.wait_while_acquiring();
        loop {
            match self.status.compare_exchange_weak(
                current,
                desired,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(ACQUIRING) => current = self.wait_while_acquiring(),
                Err(actual) => current = actual,
            }
        }
    }

    #[inline]
    fn into_ownership(self) -> bool {
        // Owned by value, so nothing can race with this load.
        self.status.load(Ordering::Relaxed) == OWNER
    }

    #[inline]
    fn try_acquire_ownership_once<E, F>(&self, detach: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        // Fast path: already own the payload.
        if self.status.load(Ordering::Acquire) == OWNER {
            return Ok(());
        }

        if !self.claim() {
            return Ok(());
        }

        let reset = ResetOnFailure {
            status: &self.status,
        };
        let result = run_detach(Self::STRATEGY, detach);
        if result.is_ok() {
            std::mem::forget(reset);
            // Publishes the detach's writes to every acquire load of `Owner`.
            self.status.store(OWNER, Ordering::Release);
        }
        result
    }
}

impl fmt::Debug for AtomicFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicFlag").field(&self.status()).finish()
    }
}
