//! Progress-callback trait for conversion attempt events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::session::Session::with_progress`] to be told when an attempt
//! starts, when its payload is encoded, and how it settles. A presentation
//! layer uses this to drive a spinner or re-render; the CLI forwards the
//! events to an `indicatif` progress bar.
//!
//! # Example
//!
//! ```rust
//! use omniconvert::{ConversionProgressCallback, Failure, Session};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     failures: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_attempt_error(&self, _attempt: u64, failure: &Failure) {
//!         self.failures.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("conversion failed: {failure}");
//!     }
//! }
//!
//! let session = Session::default()
//!     .with_progress(Arc::new(CountingCallback { failures: AtomicUsize::new(0) }));
//! ```

use crate::config::ProcessingTier;
use crate::error::Failure;
use crate::format::TargetFormat;
use std::sync::Arc;

/// Called by the session as an attempt moves through its lifecycle.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync` because an
/// attempt may be awaited on any runtime thread.
pub trait ConversionProgressCallback: Send + Sync {
    /// The session entered `Processing`.
    fn on_attempt_start(
        &self,
        attempt: u64,
        file_name: &str,
        format: TargetFormat,
        tier: ProcessingTier,
    ) {
        let _ = (attempt, file_name, format, tier);
    }

    /// The file was read and encoded; the request is about to be sent.
    fn on_payload_encoded(&self, attempt: u64, encoded_len: usize) {
        let _ = (attempt, encoded_len);
    }

    /// The attempt settled with a result.
    fn on_attempt_success(&self, attempt: u64, result_len: usize) {
        let _ = (attempt, result_len);
    }

    /// The attempt settled with a failure.
    fn on_attempt_error(&self, attempt: u64, failure: &Failure) {
        let _ = (attempt, failure);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias for the type stored in [`crate::session::Session`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        encoded: AtomicUsize,
        successes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_attempt_start(&self, _: u64, _: &str, _: TargetFormat, _: ProcessingTier) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_payload_encoded(&self, _: u64, encoded_len: usize) {
            self.encoded.store(encoded_len, Ordering::SeqCst);
        }

        fn on_attempt_success(&self, _: u64, _: usize) {
            self.successes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_attempt_error(&self, _: u64, _: &Failure) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_attempt_start(1, "a.pdf", TargetFormat::Docx, ProcessingTier::Fast);
        cb.on_payload_encoded(1, 42);
        cb.on_attempt_success(1, 7);
        cb.on_attempt_error(2, &Failure::new(FailureKind::EmptyResult, "empty"));
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_attempt_start(1, "a.pdf", TargetFormat::Json, ProcessingTier::Deep);
        tracker.on_payload_encoded(1, 1024);
        tracker.on_attempt_error(1, &Failure::new(FailureKind::ServiceError, "down"));
        tracker.on_attempt_start(2, "a.pdf", TargetFormat::Json, ProcessingTier::Deep);
        tracker.on_attempt_success(2, 10);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.encoded.load(Ordering::SeqCst), 1024);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.successes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_attempt_success(1, 512);
    }
}
