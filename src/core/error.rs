//! Error types for the observability core

use std::time::Duration;

pub type Result<T> = std::result::Result<T, ObservabilityError>;

#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Sink worker already stopped
    #[error("Log sink already stopped")]
    SinkStopped,

    /// Channel send error
    #[error("Failed to send log record to async worker")]
    ChannelSendError,

    /// A flush stage ran out of time
    #[error("Flush of {stage} did not complete within {timeout:?}")]
    FlushTimeout { stage: String, timeout: Duration },

    /// Exporter, provider or sink reported a failure
    #[error("{stage} failed: {message}")]
    Collaborator { stage: String, message: String },

    /// Error tracker rejected or failed to deliver a report
    #[error("Error tracker failure: {0}")]
    ErrorTracker(String),

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ObservabilityError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        ObservabilityError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        ObservabilityError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a flush timeout error for the named stage
    pub fn flush_timeout(stage: impl Into<String>, timeout: Duration) -> Self {
        ObservabilityError::FlushTimeout {
            stage: stage.into(),
            timeout,
        }
    }

    /// Create a collaborator failure for the named stage
    pub fn collaborator(stage: impl Into<String>, message: impl Into<String>) -> Self {
        ObservabilityError::Collaborator {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create an error tracker failure
    pub fn error_tracker<S: Into<String>>(msg: S) -> Self {
        ObservabilityError::ErrorTracker(msg.into())
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        ObservabilityError::WriterError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        ObservabilityError::Other(msg.into())
    }

    /// Whether this error means a deadline ran out rather than a hard failure
    pub fn is_timeout(&self) -> bool {
        matches!(self, ObservabilityError::FlushTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ObservabilityError::config("ObservabilityConfig", "bad level");
        assert!(matches!(err, ObservabilityError::InvalidConfiguration { .. }));

        let err = ObservabilityError::collaborator("traces", "exporter unreachable");
        assert!(matches!(err, ObservabilityError::Collaborator { .. }));

        let err = ObservabilityError::flush_timeout("metrics", Duration::from_millis(5));
        assert!(err.is_timeout());
    }

    #[test]
    fn test_error_display() {
        let err = ObservabilityError::flush_timeout("log sink", Duration::from_secs(1));
        assert_eq!(err.to_string(), "Flush of log sink did not complete within 1s");

        let err = ObservabilityError::collaborator("traces", "connection refused");
        assert_eq!(err.to_string(), "traces failed: connection refused");

        let err = ObservabilityError::config("level", "unknown level 'loud'");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for level: unknown level 'loud'"
        );
    }

    #[test]
    fn test_io_operation_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = ObservabilityError::io_operation("writing log file", "cannot write", io_err);

        assert!(matches!(err, ObservabilityError::IoOperation { .. }));
        assert!(err.to_string().contains("writing log file"));
        assert!(!err.is_timeout());
    }
}
