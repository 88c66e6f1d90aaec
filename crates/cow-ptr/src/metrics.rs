//! Detach statistics.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Process-level cumulative detach statistics.
///
/// Counters cover every `CowPtr` of every type and ownership strategy since
/// process start. They are updated with relaxed atomics, so a snapshot taken
/// while other threads are writing is only approximately consistent.
///
/// # Example
///
/// ```
/// use cow_ptr::{detach_metrics, CowPtr};
///
/// let before = detach_metrics().total_detaches();
///
/// let original: CowPtr<i32> = CowPtr::new(1);
/// let mut copy = original.clone();
/// copy.write(2);
///
/// assert!(detach_metrics().total_detaches() > before);
/// ```
#[derive(Debug)]
pub struct DetachMetrics {
    detaches: AtomicUsize,
    deep_copies: AtomicUsize,
    reclaims: AtomicUsize,
    contended_waits: AtomicUsize,
    failed_detaches: AtomicUsize,
}

impl Default for DetachMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DetachMetrics {
    /// Create a new `DetachMetrics` with all counters initialized to zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            detaches: AtomicUsize::new(0),
            deep_copies: AtomicUsize::new(0),
            reclaims: AtomicUsize::new(0),
            contended_waits: AtomicUsize::new(0),
            failed_detaches: AtomicUsize::new(0),
        }
    }

    /// Returns the number of detach operations that completed successfully.
    #[inline]
    #[must_use]
    pub fn total_detaches(&self) -> usize {
        self.detaches.load(Ordering::Relaxed)
    }

    /// Returns the number of detaches that allocated a copy of the payload.
    #[inline]
    #[must_use]
    pub fn total_deep_copies(&self) -> usize {
        self.deep_copies.load(Ordering::Relaxed)
    }

    /// Returns the number of detaches that found the payload already unique
    /// and kept it instead of copying.
    #[inline]
    #[must_use]
    pub fn total_reclaims(&self) -> usize {
        self.reclaims.load(Ordering::Relaxed)
    }

    /// Returns the number of times a caller had to wait for a detach running
    /// on another thread.
    #[inline]
    #[must_use]
    pub fn total_contended_waits(&self) -> usize {
        self.contended_waits.load(Ordering::Relaxed)
    }

    /// Returns the number of detach operations that returned an error or
    /// panicked.
    #[inline]
    #[must_use]
    pub fn total_failed_detaches(&self) -> usize {
        self.failed_detaches.load(Ordering::Relaxed)
    }
}

static DETACH_METRICS: DetachMetrics = DetachMetrics::new();

/// Get the global cumulative detach metrics.
#[must_use]
pub fn detach_metrics() -> &'static DetachMetrics {
    &DETACH_METRICS
}

pub(crate) fn record_detach() {
    DETACH_METRICS.detaches.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_deep_copy() {
    DETACH_METRICS.deep_copies.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_reclaim() {
    DETACH_METRICS.reclaims.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_contended_wait() {
    DETACH_METRICS.contended_waits.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_failed_detach() {
    DETACH_METRICS.failed_detaches.fetch_add(1, Ordering::Relaxed);
}
