//! The `SharedPayload<T>` reference-counted storage.
//!
//! This is the storage collaborator of [`CowPtr`](crate::CowPtr): an atomically
//! reference-counted heap allocation holding one `T`. Handles can be shared and
//! dropped concurrently from any number of threads. On top of the usual
//! `Arc`-like surface it offers the two things the copy-on-write path needs:
//! a uniqueness query and a deep copy into a fresh allocation.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;

use crate::sync::{fence, AtomicUsize, Ordering};

/// Handles past this count abort the process instead of wrapping the counter.
const MAX_REF_COUNT: usize = isize::MAX as usize;

// ============================================================================
// `PayloadBox` - The heap allocation container
// ============================================================================

/// The heap allocation wrapping the user's value.
struct PayloadBox<T> {
    /// Number of live `SharedPayload` handles.
    ref_count: AtomicUsize,
    /// The user's data.
    value: T,
}

impl<T> PayloadBox<T> {
    /// Increment the reference count.
    /// Uses Relaxed ordering: a new handle can only be made from an existing
    /// one, which already keeps the allocation alive.
    #[inline]
    fn inc_ref(&self) {
        let old = self.ref_count.fetch_add(1, Ordering::Relaxed);
        if old > MAX_REF_COUNT {
            std::process::abort();
        }
    }

    /// Decrement the reference count. Returns true if this was the last handle.
    /// Uses Release ordering so that every use of the value through this
    /// handle happens-before the deallocation.
    #[inline]
    fn dec_ref(&self) -> bool {
        if self.ref_count.fetch_sub(1, Ordering::Release) != 1 {
            return false;
        }
        // Pairs with the Release decrements of the other handles.
        fence(Ordering::Acquire);
        true
    }
}

// ============================================================================
// `SharedPayload<T>` - The public handle
// ============================================================================

/// A thread-safe reference-counted pointer to a heap-allocated `T`.
///
/// Cloning a `SharedPayload` shares the allocation and costs one atomic
/// increment. [`SharedPayload::deep_copy`] allocates an independent copy of
/// the value instead.
///
/// # Examples
///
/// ```
/// use cow_ptr::SharedPayload;
///
/// let a = SharedPayload::new(vec![1, 2, 3]);
/// let b = SharedPayload::clone(&a);
/// assert!(SharedPayload::ptr_eq(&a, &b));
/// assert_eq!(SharedPayload::ref_count(&a), 2);
///
/// let c = SharedPayload::deep_copy(&a);
/// assert!(!SharedPayload::ptr_eq(&a, &c));
/// assert_eq!(*c, [1, 2, 3]);
/// ```
pub struct SharedPayload<T> {
    ptr: NonNull<PayloadBox<T>>,
    _marker: PhantomData<PayloadBox<T>>,
}

// SAFETY: Same reasoning as `Arc<T>`: handles on different threads can reach
// the same `T` by shared reference, and the last one to drop it may be on any
// thread, so `T` must be both `Send` and `Sync`.
unsafe impl<T: Send + Sync> Send for SharedPayload<T> {}
// SAFETY: See above.
unsafe impl<T: Send + Sync> Sync for SharedPayload<T> {}

impl<T> SharedPayload<T> {
    /// Allocate `value` on the heap and take ownership of it.
    ///
    /// The returned handle is the only one referencing the allocation.
    #[must_use]
    pub fn new(value: T) -> Self {
        let boxed = Box::new(PayloadBox {
            ref_count: AtomicUsize::new(1),
            value,
        });
        Self {
            ptr: NonNull::from(Box::leak(boxed)),
            _marker: PhantomData,
        }
    }

    #[inline]
    fn inner(&self) -> &PayloadBox<T> {
        // SAFETY: The allocation stays live as long as this handle does.
        unsafe { self.ptr.as_ref() }
    }

    /// Get the number of handles referencing this allocation.
    ///
    /// The value may be stale by the time it is returned if other threads
    /// hold handles to the same allocation.
    #[must_use]
    pub fn ref_count(this: &Self) -> usize {
        this.inner().ref_count.load(Ordering::Acquire)
    }

    /// Returns true if `this` is the only handle referencing its allocation.
    ///
    /// A `true` answer is stable while `this` is borrowed: no other handle
    /// exists from which a new one could be cloned.
    #[must_use]
    pub fn is_unique(this: &Self) -> bool {
        // Acquire pairs with the Release decrement of the handle that went
        // away last, so its uses of the value are visible to ours.
        this.inner().ref_count.load(Ordering::Acquire) == 1
    }

    /// Returns true if both handles reference the same allocation.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr == other.ptr
    }

    /// Get a raw pointer to the value.
    #[must_use]
    pub fn as_ptr(this: &Self) -> *const T {
        // SAFETY: `ptr` is valid; `addr_of!` avoids creating a reference.
        unsafe { std::ptr::addr_of!((*this.ptr.as_ptr()).value) }
    }

    /// Get a mutable reference to the value if `this` is the only handle.
    #[must_use]
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        if Self::is_unique(this) {
            // SAFETY: Uniqueness was just checked and `this` is borrowed mutably.
            Some(unsafe { Self::get_mut_unchecked(this) })
        } else {
            None
        }
    }

    /// Get a mutable reference to the value without checking uniqueness.
    ///
    /// # Safety
    ///
    /// No other handle to the same allocation may be used to access the value
    /// for as long as the returned reference lives.
    #[inline]
    pub unsafe fn get_mut_unchecked(this: &mut Self) -> &mut T {
        // SAFETY: Caller guarantees exclusive access to the value.
        unsafe { &mut (*this.ptr.as_ptr()).value }
    }

    /// Allocate a new, independent copy of the value.
    ///
    /// The source allocation is left untouched.
    #[must_use]
    pub fn deep_copy(this: &Self) -> Self
    where
        T: Clone,
    {
        Self::new(T::clone(&**this))
    }

    /// Allocate a new payload from a fallible copy of the value.
    ///
    /// # Errors
    ///
    /// Returns whatever error `copy` returns. Nothing is allocated in that case.
    pub fn try_deep_copy_with<E>(
        this: &Self,
        copy: impl FnOnce(&T) -> Result<T, E>,
    ) -> Result<Self, E> {
        copy(&**this).map(Self::new)
    }

    /// Take the value out if `this` is the only handle, otherwise give the
    /// handle back.
    ///
    /// # Errors
    ///
    /// Returns `this` unchanged when other handles to the allocation exist.
    pub fn try_unwrap(this: Self) -> Result<T, Self> {
        if this
            .inner()
            .ref_count
            .compare_exchange(1, 0, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(this);
        }
        let this = std::mem::ManuallyDrop::new(this);
        // SAFETY: The count went from 1 to 0, so no other handle exists and
        // `this` will not run its destructor.
        let boxed = unsafe { Box::from_raw(this.ptr.as_ptr()) };
        Ok(boxed.value)
    }
}

impl<T> Clone for SharedPayload<T> {
    fn clone(&self) -> Self {
        self.inner().inc_ref();
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for SharedPayload<T> {
    fn drop(&mut self) {
        if self.inner().dec_ref() {
            // SAFETY: This was the last handle, nothing else can reach the box.
            unsafe {
                drop(Box::from_raw(self.ptr.as_ptr()));
            }
        }
    }
}

impl<T> Deref for SharedPayload<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.inner().value
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedPayload<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedPayload").field(&**self).finish()
    }
}

impl<T> fmt::Pointer for SharedPayload<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&Self::as_ptr(self), f)
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::sync::Arc;

    struct DropProbe(Arc<StdAtomicUsize>);

    impl Drop for DropProbe {
        fn drop(&mut self) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[test]
    fn test_new_is_unique() {
        let p = SharedPayload::new(7);
        assert!(SharedPayload::is_unique(&p));
        assert_eq!(SharedPayload::ref_count(&p), 1);
        assert_eq!(*p, 7);
    }

    #[test]
    fn test_clone_and_drop_track_ref_count() {
        let a = SharedPayload::new(String::from("shared"));
        let b = a.clone();
        assert_eq!(SharedPayload::ref_count(&a), 2);
        assert!(!SharedPayload::is_unique(&a));
        drop(b);
        assert!(SharedPayload::is_unique(&a));
    }

    #[test]
    fn test_value_dropped_exactly_once() {
        let drops = Arc::new(StdAtomicUsize::new(0));
        let a = SharedPayload::new(DropProbe(Arc::clone(&drops)));
        let b = a.clone();
        let c = b.clone();
        drop(a);
        drop(c);
        assert_eq!(drops.load(std::sync::atomic::Ordering::SeqCst), 0);
        drop(b);
        assert_eq!(drops.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_mut_requires_uniqueness() {
        let mut a = SharedPayload::new(1);
        let b = a.clone();
        assert!(SharedPayload::get_mut(&mut a).is_none());
        drop(b);
        *SharedPayload::get_mut(&mut a).unwrap() = 2;
        assert_eq!(*a, 2);
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let a = SharedPayload::new(vec![1, 2]);
        let mut b = SharedPayload::deep_copy(&a);
        assert!(!SharedPayload::ptr_eq(&a, &b));
        SharedPayload::get_mut(&mut b).unwrap().push(3);
        assert_eq!(*a, [1, 2]);
        assert_eq!(*b, [1, 2, 3]);
    }

    #[test]
    fn test_try_deep_copy_with_error_allocates_nothing() {
        let a = SharedPayload::new(5);
        let result: Result<SharedPayload<i32>, &str> =
            SharedPayload::try_deep_copy_with(&a, |_| Err("no"));
        assert_eq!(result.unwrap_err(), "no");
        assert!(SharedPayload::is_unique(&a));
    }

    #[test]
    fn test_try_unwrap() {
        let a = SharedPayload::new(3);
        let b = a.clone();
        let a = SharedPayload::try_unwrap(a).unwrap_err();
        drop(b);
        assert_eq!(SharedPayload::try_unwrap(a).unwrap(), 3);
    }

    #[test]
    fn test_concurrent_clone_and_drop() {
        let drops = Arc::new(StdAtomicUsize::new(0));
        let root = SharedPayload::new(DropProbe(Arc::clone(&drops)));
        std::thread::scope(|s| {
            for _ in 0..8 {
                let local = root.clone();
                s.spawn(move || {
                    for _ in 0..1000 {
                        let copy = local.clone();
                        drop(copy);
                    }
                });
            }
        });
        assert!(SharedPayload::is_unique(&root));
        drop(root);
        assert_eq!(drops.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
