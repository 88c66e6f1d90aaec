//! Ownership flag without any synchronization.

use std::cell::Cell;
use std::fmt;

use super::{run_detach, OwnershipFlag, OwnershipStatus};

/// An ownership flag for handles that never leave their thread.
///
/// The state is a plain `Cell<bool>`, so acquiring ownership costs a load and
/// a store. Because of the `Cell`, the flag is `Send` but not `Sync`: a
/// `CowPtr` using it can move to another thread but cannot be shared between
/// threads by reference, which is the only situation its unsynchronized
/// check-then-set would get wrong.
///
/// # Examples
///
/// ```
/// use cow_ptr::flag::{OwnershipFlag, ThreadUnsafeFlag};
///
/// let flag = ThreadUnsafeFlag::new(false);
/// let mut copies = 0;
/// flag.acquire_ownership_once(|| copies += 1);
/// flag.acquire_ownership_once(|| copies += 1);
/// assert_eq!(copies, 1);
/// ```
pub struct ThreadUnsafeFlag {
    owned: Cell<bool>,
}

impl OwnershipFlag for ThreadUnsafeFlag {
    const STRATEGY: &'static str = "thread_unsafe";

    #[inline]
    fn new(initially_owned: bool) -> Self {
        Self {
            owned: Cell::new(initially_owned),
        }
    }

    #[inline]
    fn status(&self) -> OwnershipStatus {
        OwnershipStatus::from_owned(self.owned.get())
    }

    #[inline]
    fn set_ownership(&self, owned: bool) {
        self.owned.set(owned);
    }

    #[inline]
    fn into_ownership(self) -> bool {
        self.owned.into_inner()
    }

    #[inline]
    fn try_acquire_ownership_once<E, F>(&self, detach: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        if !self.owned.get() {
            run_detach(Self::STRATEGY, detach)?;
            self.owned.set(true);
        }
        Ok(())
    }
}

impl fmt::Debug for ThreadUnsafeFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ThreadUnsafeFlag")
            .field(&self.status())
            .finish()
    }
}
