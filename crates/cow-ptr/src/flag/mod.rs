//! Ownership flags: the acquire-once gate in front of every copy-on-write.
//!
//! Writing to copy-on-write data relies on a notion of ownership. A handle
//! that owns its payload writes in place. A handle that does not must first
//! *detach*: replace its shared payload with a private copy. When several
//! threads write through the same handle at once, the detach must run exactly
//! once, and everybody else must wait until the new payload is in place.
//!
//! [`OwnershipFlag`] captures that contract. Three strategies implement it:
//!
//! | Strategy             | State            | Steady-state cost       | Shareable |
//! |----------------------|------------------|-------------------------|-----------|
//! | [`ThreadUnsafeFlag`] | `Cell<bool>`     | one plain load          | no        |
//! | [`MutexFlag`]        | `Mutex<bool>`    | one lock/unlock pair    | yes       |
//! | [`AtomicFlag`]       | `AtomicU8`       | one acquire load        | yes       |
//!
//! Flags are deliberately not `Clone`: copying a flag that claims ownership
//! would hand that claim to a second handle. They can be moved, and their
//! state can be read out of a uniquely owned flag without synchronization
//! through [`OwnershipFlag::into_ownership`].

mod atomic;
mod mutex;
mod thread_unsafe;

pub use atomic::AtomicFlag;
pub use mutex::MutexFlag;
pub use thread_unsafe::ThreadUnsafeFlag;

use std::convert::Infallible;

use crate::metrics;
use crate::tracing::internal::{log_detach_failed, trace_detach};

/// Ownership state of a handle's payload.
///
/// Only [`AtomicFlag`] ever reports `AcquiringOwnership`; the other
/// strategies go straight from `NotOwner` to `Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum OwnershipStatus {
    /// The payload may be shared; a write must detach first.
    NotOwner = 0,
    /// A detach is running on some thread.
    AcquiringOwnership = 1,
    /// The payload is private to this handle.
    Owner = 2,
}

impl OwnershipStatus {
    /// Map a plain "owned" boolean to one of the two steady states.
    #[inline]
    #[must_use]
    pub const fn from_owned(owned: bool) -> Self {
        if owned {
            Self::Owner
        } else {
            Self::NotOwner
        }
    }

    /// Returns true for [`OwnershipStatus::Owner`].
    #[inline]
    #[must_use]
    pub const fn is_owner(self) -> bool {
        matches!(self, Self::Owner)
    }

    #[inline]
    pub(crate) const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::NotOwner,
            1 => Self::AcquiringOwnership,
            _ => Self::Owner,
        }
    }
}

/// The acquire-once synchronization contract.
///
/// # Contract
///
/// - [`try_acquire_ownership_once`](Self::try_acquire_ownership_once) runs its
///   closure at most once per successful acquisition, no matter how many
///   threads call it concurrently on the same flag. Every other concurrent
///   caller returns only after that run has completed and its memory effects
///   are visible.
/// - Once the flag is `Owner`, further calls return immediately without
///   running their closure.
/// - If the closure fails (returns `Err` or panics), the flag is left
///   `NotOwner` and the failure reaches only the caller that ran it. Waiting
///   callers then compete to run their own closure.
/// - [`set_ownership`](Self::set_ownership) is synchronized against concurrent
///   acquisitions: it never overwrites an acquisition in progress.
pub trait OwnershipFlag {
    /// Short human-readable name of the strategy, used in tracing output.
    const STRATEGY: &'static str;

    /// Create a flag in the given state.
    ///
    /// No synchronization is needed: only the constructing thread can see the
    /// new flag.
    fn new(initially_owned: bool) -> Self
    where
        Self: Sized;

    /// Current state of the flag.
    fn status(&self) -> OwnershipStatus;

    /// Returns true if the flag is in the `Owner` state.
    #[inline]
    fn is_owner(&self) -> bool {
        self.status().is_owner()
    }

    /// Authoritatively mark the payload as owned or not owned.
    fn set_ownership(&self, owned: bool);

    /// Consume the flag and return whether it was `Owner`.
    ///
    /// Taking `self` by value proves nobody else can observe the flag, so no
    /// synchronization is involved. This is the read half of a flag move.
    fn into_ownership(self) -> bool
    where
        Self: Sized;

    /// Acquire ownership once, using a fallible acquisition routine.
    ///
    /// # Errors
    ///
    /// Returns the error of `detach` if this caller ran it and it failed. The
    /// flag stays `NotOwner` in that case.
    fn try_acquire_ownership_once<E, F>(&self, detach: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<(), E>;

    /// Acquire ownership once, using an infallible acquisition routine.
    #[inline]
    fn acquire_ownership_once<F>(&self, detach: F)
    where
        F: FnOnce(),
    {
        let result = self.try_acquire_ownership_once(|| {
            detach();
            Ok::<(), Infallible>(())
        });
        match result {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }
}

/// Records a failed detach when dropped without being disarmed.
struct DetachOutcome {
    strategy: &'static str,
    completed: bool,
}

impl Drop for DetachOutcome {
    fn drop(&mut self) {
        if self.completed {
            metrics::record_detach();
        } else {
            metrics::record_failed_detach();
            log_detach_failed(self.strategy);
        }
    }
}

/// Run one detach closure on behalf of a flag strategy, with the tracing span
/// and the metrics every strategy shares. Unwinding counts as a failure.
pub(crate) fn run_detach<E>(
    strategy: &'static str,
    detach: impl FnOnce() -> Result<(), E>,
) -> Result<(), E> {
    let _span = trace_detach(strategy);
    let mut outcome = DetachOutcome {
        strategy,
        completed: false,
    };
    let result = detach();
    outcome.completed = result.is_ok();
    result
}

#[cfg(all(test, not(loom)))]
pub(crate) mod contract_tests {
    //! Checks shared by the unit tests of every strategy.

    use super::{OwnershipFlag, OwnershipStatus};
    use std::cell::Cell;

    pub fn initial_state<F: OwnershipFlag>() {
        assert_eq!(F::new(true).status(), OwnershipStatus::Owner);
        assert_eq!(F::new(false).status(), OwnershipStatus::NotOwner);
        assert!(F::new(true).into_ownership());
        assert!(!F::new(false).into_ownership());
    }

    pub fn acquire_runs_once<F: OwnershipFlag>() {
        let flag = F::new(false);
        let runs = Cell::new(0);
        flag.acquire_ownership_once(|| runs.set(runs.get() + 1));
        flag.acquire_ownership_once(|| runs.set(runs.get() + 1));
        flag.acquire_ownership_once(|| runs.set(runs.get() + 1));
        assert_eq!(runs.get(), 1);
        assert!(flag.is_owner());
    }

    pub fn owner_never_runs<F: OwnershipFlag>() {
        let flag = F::new(true);
        let runs = Cell::new(0);
        flag.acquire_ownership_once(|| runs.set(runs.get() + 1));
        flag.acquire_ownership_once(|| runs.set(runs.get() + 1));
        assert_eq!(runs.get(), 0);
    }

    pub fn failure_leaves_not_owner<F: OwnershipFlag>() {
        let flag = F::new(false);
        let err = flag.try_acquire_ownership_once(|| Err("copy failed"));
        assert_eq!(err, Err("copy failed"));
        assert_eq!(flag.status(), OwnershipStatus::NotOwner);

        let runs = Cell::new(0);
        let ok: Result<(), &str> = flag.try_acquire_ownership_once(|| {
            runs.set(runs.get() + 1);
            Ok(())
        });
        assert_eq!(ok, Ok(()));
        assert_eq!(runs.get(), 1);
        assert!(flag.is_owner());
    }

    pub fn set_ownership_round_trip<F: OwnershipFlag>() {
        let flag = F::new(true);
        flag.set_ownership(false);
        assert_eq!(flag.status(), OwnershipStatus::NotOwner);

        let runs = Cell::new(0);
        flag.acquire_ownership_once(|| runs.set(runs.get() + 1));
        assert_eq!(runs.get(), 1);

        flag.set_ownership(true);
        flag.acquire_ownership_once(|| runs.set(runs.get() + 1));
        assert_eq!(runs.get(), 1);
    }
}
