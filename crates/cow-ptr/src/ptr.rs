//! The `CowPtr<T, F>` smart pointer implementation.
//!
//! This module provides the primary user-facing type: a handle to a shared
//! payload that detaches into a private copy the first time it is written.

use std::cell::UnsafeCell;
use std::convert::Infallible;
use std::fmt;
use std::ops::Deref;

use crate::flag::{AtomicFlag, MutexFlag, OwnershipFlag, ThreadUnsafeFlag};
use crate::metrics;
use crate::payload::SharedPayload;
use crate::tracing::internal::{log_detach_copied, log_detach_reclaimed};

/// A copy-on-write pointer.
///
/// Cloning a `CowPtr` is O(1): both handles share one allocation. The first
/// write through either handle *detaches* it, giving it a private copy of the
/// value, so the write is never visible through the other handle.
///
/// Each handle carries its own ownership flag of type `F`, chosen among the
/// strategies in [`flag`](crate::flag). The flag is per handle, not per
/// allocation: two handles sharing a payload never contend with each other.
///
/// # Ownership invariant
///
/// A handle whose flag reports `Owner` holds the only reference to its
/// payload. This is what makes writing in place sound. To maintain it,
/// cloning a handle clears the ownership of *both* handles; a later detach
/// that finds the payload unique again reuses it instead of copying.
///
/// # Concurrency
///
/// `read` through a shared reference is always fine. Mutation normally goes
/// through `&mut self` ([`write`](Self::write), [`make_mut`](Self::make_mut)),
/// where the borrow checker rules out races. Threads sharing a single handle
/// by reference can still race to detach it with the unsafe
/// [`ensure_owned`](Self::ensure_owned), which runs the detach exactly once.
/// Reads racing with a detach or a write of the *same* handle are a data race
/// that this type does not try to prevent.
///
/// # Examples
///
/// ```
/// use cow_ptr::CowPtr;
///
/// let p: CowPtr<i32> = CowPtr::new(5);
/// let mut q = p.clone();
/// assert_eq!((*p.read(), *q.read()), (5, 5));
///
/// q.write(9);
/// assert_eq!((*p.read(), *q.read()), (5, 9));
/// ```
///
/// A moved-from handle cannot be used again:
///
/// ```compile_fail
/// use cow_ptr::CowPtr;
///
/// let a: CowPtr<i32> = CowPtr::new(1);
/// let b = a;
/// assert_eq!(*a.read(), 1);
/// ```
///
/// The unsynchronized strategy cannot be shared across threads:
///
/// ```compile_fail
/// use cow_ptr::UnsyncCowPtr;
///
/// let p = UnsyncCowPtr::new(1);
/// std::thread::scope(|s| {
///     s.spawn(|| p.read());
/// });
/// ```
pub struct CowPtr<T, F: OwnershipFlag = AtomicFlag> {
    payload: UnsafeCell<SharedPayload<T>>,
    ownership: F,
}

/// A `CowPtr` for single-threaded use, without any synchronization.
pub type UnsyncCowPtr<T> = CowPtr<T, ThreadUnsafeFlag>;

/// A `CowPtr` whose ownership acquisition is guarded by a mutex.
pub type MutexCowPtr<T> = CowPtr<T, MutexFlag>;

/// A `CowPtr` whose ownership acquisition is lock-free.
pub type AtomicCowPtr<T> = CowPtr<T, AtomicFlag>;

// SAFETY: Through `&CowPtr` safe code can only read the payload, clone the
// handle (an atomic refcount increment plus a synchronized flag update) and
// query the flag. Replacing the payload through `&self` is confined to the
// unsafe `ensure_owned`, whose contract excludes concurrent reads.
unsafe impl<T: Send + Sync, F: OwnershipFlag + Sync> Sync for CowPtr<T, F> {}

impl<T, F: OwnershipFlag> CowPtr<T, F> {
    /// Take ownership of `value` in a fresh allocation.
    ///
    /// The new handle owns its payload: its first write happens in place.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::from_parts(SharedPayload::new(value), true)
    }

    /// Wrap an existing payload handle.
    ///
    /// The new handle owns the payload only if `payload` was the sole
    /// reference to its allocation.
    #[must_use]
    pub fn from_shared(payload: SharedPayload<T>) -> Self {
        let unique = SharedPayload::is_unique(&payload);
        Self::from_parts(payload, unique)
    }

    #[inline]
    fn from_parts(payload: SharedPayload<T>, owned: bool) -> Self {
        Self {
            payload: UnsafeCell::new(payload),
            ownership: F::new(owned),
        }
    }

    /// Move-construct a handle from `source`, re-deriving its ownership.
    ///
    /// The payload reference is transferred without touching the refcount.
    /// The new handle is `Owner` when that reference is the only one to its
    /// allocation and `NotOwner` when sibling handles still share it.
    #[must_use]
    pub fn transfer(source: Self) -> Self {
        let (payload, _) = source.into_parts();
        let unique = SharedPayload::is_unique(&payload);
        Self::from_parts(payload, unique)
    }

    /// Move-assign `source` into `self`.
    ///
    /// The old payload reference of `self` is released and the ownership
    /// state of `source` is moved over with [`OwnershipFlag::set_ownership`].
    pub fn assign(&mut self, source: Self) {
        let (payload, owned) = source.into_parts();
        *self.payload.get_mut() = payload;
        self.ownership.set_ownership(owned);
    }

    fn into_parts(self) -> (SharedPayload<T>, bool) {
        let Self { payload, ownership } = self;
        (payload.into_inner(), ownership.into_ownership())
    }

    /// Consume the handle and return its payload reference.
    #[must_use]
    pub fn into_shared(self) -> SharedPayload<T> {
        self.into_parts().0
    }

    #[inline]
    fn shared(&self) -> &SharedPayload<T> {
        // SAFETY: The payload slot is only replaced through `&mut self` or by
        // `ensure_owned`, whose callers guarantee no borrow from `read` is
        // alive at that time.
        unsafe { &*self.payload.get() }
    }

    /// Borrow the current value.
    ///
    /// Never detaches, never blocks.
    #[inline]
    #[must_use]
    pub fn read(&self) -> &T {
        self.shared()
    }

    /// Returns true if this handle currently owns its payload.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.ownership.is_owner()
    }

    /// Get the number of handles sharing this handle's payload.
    #[must_use]
    pub fn ref_count(this: &Self) -> usize {
        SharedPayload::ref_count(this.shared())
    }

    /// Returns true if both handles currently share the same payload.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        SharedPayload::ptr_eq(this.shared(), other.shared())
    }

    /// Replace the payload slot with a private payload.
    ///
    /// Reuses the current allocation when no sibling shares it any more,
    /// otherwise installs the result of `copy`.
    fn detach_with<E>(
        slot: &mut SharedPayload<T>,
        copy: impl FnOnce(&T) -> Result<T, E>,
    ) -> Result<(), E> {
        if SharedPayload::is_unique(slot) {
            metrics::record_reclaim();
            log_detach_reclaimed();
            return Ok(());
        }
        let private = SharedPayload::try_deep_copy_with(slot, copy)?;
        metrics::record_deep_copy();
        log_detach_copied(SharedPayload::ref_count(slot));
        *slot = private;
        Ok(())
    }

    /// Mutable access to a payload this handle owns.
    #[inline]
    fn owned_mut(&mut self) -> &mut T {
        debug_assert!(self.ownership.is_owner());
        let slot = self.payload.get_mut();
        debug_assert!(SharedPayload::is_unique(slot));
        // SAFETY: `Owner` implies this handle holds the only reference to the
        // payload, and `&mut self` rules out any other access through it.
        unsafe { SharedPayload::get_mut_unchecked(slot) }
    }

    /// Detach using a fallible copy routine, then borrow the value mutably.
    ///
    /// `copy` is only called if the payload is still shared with another
    /// handle.
    ///
    /// # Errors
    ///
    /// Returns the error of `copy`. The handle is left unchanged and still
    /// shares its payload, so a later write may try again.
    pub fn try_make_mut_with<E>(
        &mut self,
        copy: impl FnOnce(&T) -> Result<T, E>,
    ) -> Result<&mut T, E> {
        let slot = self.payload.get_mut();
        self.ownership
            .try_acquire_ownership_once(|| Self::detach_with(slot, copy))?;
        Ok(self.owned_mut())
    }
}

impl<T: Clone, F: OwnershipFlag> CowPtr<T, F> {
    fn detach(slot: &mut SharedPayload<T>) {
        match Self::detach_with(slot, |value| Ok::<T, Infallible>(value.clone())) {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    /// Make sure this handle owns a private payload, detaching if needed.
    fn acquire(&mut self) {
        let slot = self.payload.get_mut();
        self.ownership.acquire_ownership_once(|| Self::detach(slot));
    }

    /// Overwrite the value, detaching from shared storage first if needed.
    ///
    /// After `write` returns the handle owns its payload for the rest of its
    /// life, unless it is cloned or reassigned.
    pub fn write(&mut self, value: T) {
        self.acquire();
        *self.owned_mut() = value;
    }

    /// Borrow the value mutably, detaching from shared storage first if
    /// needed.
    pub fn make_mut(&mut self) -> &mut T {
        self.acquire();
        self.owned_mut()
    }

    /// Run the ownership acquisition protocol through a shared reference.
    ///
    /// Any number of threads may call this concurrently on the same handle:
    /// the detach runs exactly once, and every caller returns only after the
    /// handle's new payload is in place and visible to it.
    ///
    /// # Safety
    ///
    /// The detach replaces the payload behind `&self`. Cloning the handle
    /// (including through `clone_from` on another handle) clears its ownership,
    /// so each `ensure_owned` call made after such a clone, or after the
    /// handle was created or assigned without owning its payload, may replace
    /// the payload again. The caller must ensure that:
    ///
    /// - no reference obtained from [`read`](Self::read) or `Deref` on this
    ///   handle is alive across any such call, and no thread reads the handle
    ///   while one is in progress;
    /// - no thread clones this handle while any `ensure_owned` call on it is
    ///   in progress.
    ///
    /// A caller may read the handle once its own call has returned. That
    /// borrow stays valid only until the handle is next cloned; it must be
    /// dropped before the next `ensure_owned` call after that clone.
    pub unsafe fn ensure_owned(&self) {
        self.ownership.acquire_ownership_once(|| {
            // SAFETY: The flag runs this closure on one thread at a time, and
            // the caller guarantees no one else accesses the slot meanwhile.
            Self::detach(unsafe { &mut *self.payload.get() });
        });
    }
}

impl<T, F: OwnershipFlag> Clone for CowPtr<T, F> {
    /// Share the payload with a new handle. Neither handle owns it afterwards.
    fn clone(&self) -> Self {
        self.ownership.set_ownership(false);
        Self::from_parts(self.shared().clone(), false)
    }

    /// Copy-assign: release the old payload, then share `source`'s.
    fn clone_from(&mut self, source: &Self) {
        source.ownership.set_ownership(false);
        *self.payload.get_mut() = source.shared().clone();
        self.ownership.set_ownership(false);
    }
}

impl<T, F: OwnershipFlag> Deref for CowPtr<T, F> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        self.read()
    }
}

impl<T, F: OwnershipFlag> AsRef<T> for CowPtr<T, F> {
    fn as_ref(&self) -> &T {
        self.read()
    }
}

impl<T, F: OwnershipFlag> From<T> for CowPtr<T, F> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Default, F: OwnershipFlag> Default for CowPtr<T, F> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: PartialEq, F: OwnershipFlag> PartialEq for CowPtr<T, F> {
    fn eq(&self, other: &Self) -> bool {
        self.read() == other.read()
    }
}

impl<T: Eq, F: OwnershipFlag> Eq for CowPtr<T, F> {}

impl<T: fmt::Debug, F: OwnershipFlag> fmt::Debug for CowPtr<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CowPtr")
            .field("value", self.read())
            .field("ownership", &self.ownership.status())
            .finish()
    }
}

impl<T: fmt::Display, F: OwnershipFlag> fmt::Display for CowPtr<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.read(), f)
    }
}
