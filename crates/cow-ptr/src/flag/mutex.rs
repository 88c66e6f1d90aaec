//! Ownership flag guarded by a mutex.

use std::fmt;

use parking_lot::Mutex;

use super::{run_detach, OwnershipFlag, OwnershipStatus};

/// An ownership flag that serializes every acquisition on a lock.
///
/// Simple and obviously correct: the check, the detach and the state change
/// all happen with the lock held, so concurrent writers through the same
/// handle queue up behind the one doing the copy. The price is that every
/// write pays a lock/unlock pair, even long after ownership was acquired.
///
/// The lock is a `parking_lot` mutex, which does not poison: a panicking
/// detach releases the lock and leaves the flag `NotOwner`.
pub struct MutexFlag {
    owned: Mutex<bool>,
}

impl OwnershipFlag for MutexFlag {
    const STRATEGY: &'static str = "mutex";

    #[inline]
    fn new(initially_owned: bool) -> Self {
        Self {
            owned: Mutex::new(initially_owned),
        }
    }

    #[inline]
    fn status(&self) -> OwnershipStatus {
        OwnershipStatus::from_owned(*self.owned.lock())
    }

    #[inline]
    fn set_ownership(&self, owned: bool) {
        *self.owned.lock() = owned;
    }

    #[inline]
    fn into_ownership(self) -> bool {
        self.owned.into_inner()
    }

    fn try_acquire_ownership_once<E, F>(&self, detach: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        let mut owned = self.owned.lock();
        if !*owned {
            run_detach(Self::STRATEGY, detach)?;
            *owned = true;
        }
        Ok(())
    }
}

impl fmt::Debug for MutexFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MutexFlag").field(&self.status()).finish()
    }
}
