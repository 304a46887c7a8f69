//! Error tracking seam
//!
//! Error-typed fields logged at Warn or above are mirrored to an
//! [`ErrorTracker`] as an [`ErrorReport`] carrying the active trace context and
//! deployment tags.

use super::trace::{SpanId, TraceId};
use crate::core::error::{ObservabilityError, Result};
use crate::core::field::ErrorValue;
use crate::core::log_level::LogLevel;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tag key for the deployment platform
pub const PLATFORM_TAG: &str = "platform";

/// Tag key for the log viewer URL
pub const LOGS_URL_TAG: &str = "logs_url";

/// One mirrored error
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub error: ErrorValue,
    /// Message of the log call that carried the error
    pub message: String,
    pub level: LogLevel,
    pub trace_id: Option<TraceId>,
    pub span_id: Option<SpanId>,
    pub tags: BTreeMap<String, String>,
}

impl ErrorReport {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

pub trait ErrorTracker: Send + Sync {
    fn capture_exception(&self, report: &ErrorReport) -> Result<()>;

    /// Deliver queued reports, waiting at most `timeout`
    fn flush(&self, timeout: Duration) -> Result<()>;

    /// Disabled trackers are skipped entirely
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Inert tracker used when none is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopErrorTracker;

impl ErrorTracker for NoopErrorTracker {
    fn capture_exception(&self, _report: &ErrorReport) -> Result<()> {
        Ok(())
    }

    fn flush(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[derive(Default)]
struct Recorded {
    reports: Mutex<Vec<ErrorReport>>,
    flushes: AtomicU64,
    capture_failure: Mutex<Option<String>>,
    flush_failure: Mutex<Option<String>>,
}

/// Tracker that keeps every report in memory. Cloning shares the store.
#[derive(Clone, Default)]
pub struct RecordingErrorTracker {
    recorded: Arc<Recorded>,
}

impl RecordingErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ErrorReport> {
        self.recorded.reports.lock().clone()
    }

    pub fn report_count(&self) -> usize {
        self.recorded.reports.lock().len()
    }

    pub fn flush_count(&self) -> u64 {
        self.recorded.flushes.load(Ordering::Relaxed)
    }

    /// Make every following capture fail with `message`
    pub fn fail_captures_with(&self, message: impl Into<String>) {
        *self.recorded.capture_failure.lock() = Some(message.into());
    }

    /// Make every following flush fail with `message`
    pub fn fail_flushes_with(&self, message: impl Into<String>) {
        *self.recorded.flush_failure.lock() = Some(message.into());
    }
}

impl ErrorTracker for RecordingErrorTracker {
    fn capture_exception(&self, report: &ErrorReport) -> Result<()> {
        if let Some(message) = self.recorded.capture_failure.lock().clone() {
            return Err(ObservabilityError::error_tracker(message));
        }
        self.recorded.reports.lock().push(report.clone());
        Ok(())
    }

    fn flush(&self, _timeout: Duration) -> Result<()> {
        if let Some(message) = self.recorded.flush_failure.lock().clone() {
            return Err(ObservabilityError::error_tracker(message));
        }
        self.recorded.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ErrorReport {
        ErrorReport {
            error: ErrorValue::msg("boom"),
            message: "request failed".to_string(),
            level: LogLevel::Error,
            trace_id: None,
            span_id: None,
            tags: BTreeMap::from([(PLATFORM_TAG.to_string(), "lambda".to_string())]),
        }
    }

    #[test]
    fn test_recording_tracker() {
        let tracker = RecordingErrorTracker::new();
        let shared = tracker.clone();

        tracker.capture_exception(&report()).unwrap();
        tracker.flush(Duration::from_millis(5)).unwrap();

        assert_eq!(shared.report_count(), 1);
        assert_eq!(shared.reports()[0].tag(PLATFORM_TAG), Some("lambda"));
        assert_eq!(shared.flush_count(), 1);
    }

    #[test]
    fn test_recording_tracker_failures() {
        let tracker = RecordingErrorTracker::new();
        tracker.fail_captures_with("dsn rejected");
        tracker.fail_flushes_with("queue stuck");

        assert!(tracker.capture_exception(&report()).is_err());
        assert!(tracker.flush(Duration::from_millis(5)).is_err());
        assert_eq!(tracker.report_count(), 0);
    }

    #[test]
    fn test_noop_tracker_disabled() {
        assert!(!NoopErrorTracker.is_enabled());
        assert!(NoopErrorTracker.capture_exception(&report()).is_ok());
    }
}
