//! Detach tracing support.
//!
//! When the `tracing` feature is enabled, this module provides structured
//! tracing spans and events for the ownership acquisition protocol.
//! Without the feature every hook compiles to nothing.

#[cfg(feature = "tracing")]
pub mod internal {
    use tracing::{span, Level};

    /// Create a span covering one run of a detach closure.
    pub fn trace_detach(strategy: &'static str) -> span::EnteredSpan {
        span!(Level::DEBUG, "detach", strategy = strategy).entered()
    }

    /// Log that a detach allocated a private copy of the payload.
    pub fn log_detach_copied(ref_count: usize) {
        tracing::debug!(ref_count, "detach_copied");
    }

    /// Log that a detach found the payload already unique.
    pub fn log_detach_reclaimed() {
        tracing::debug!("detach_reclaimed");
    }

    /// Log that a caller waited for another thread's detach.
    pub fn log_detach_contended(strategy: &'static str) {
        tracing::debug!(strategy, "detach_contended");
    }

    /// Log that a detach closure failed or unwound.
    pub fn log_detach_failed(strategy: &'static str) {
        tracing::debug!(strategy, "detach_failed");
    }
}

#[cfg(not(feature = "tracing"))]
pub mod internal {
    /// Stub function when tracing is disabled.
    #[inline(always)]
    pub const fn trace_detach(_strategy: &'static str) {}

    /// Stub function when tracing is disabled.
    #[inline(always)]
    pub const fn log_detach_copied(_ref_count: usize) {}

    /// Stub function when tracing is disabled.
    #[inline(always)]
    pub const fn log_detach_reclaimed() {}

    /// Stub function when tracing is disabled.
    #[inline(always)]
    pub const fn log_detach_contended(_strategy: &'static str) {}

    /// Stub function when tracing is disabled.
    #[inline(always)]
    pub const fn log_detach_failed(_strategy: &'static str) {}
}
