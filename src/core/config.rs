//! Logger configuration
//!
//! [`ObservabilityConfig`] is the serializable description of a process's
//! logger: level, output format, chunk threshold, flush budgets and the
//! optional async queue. Collaborators that are not data (error tracker,
//! deployment info, fatal hook) are supplied through a [`LoggerBuilder`].

use super::appender::Appender;
use super::chunking::MAX_STRING_FIELD_SIZE;
use super::error::{ObservabilityError, Result};
use super::field::Field;
use super::log_level::LogLevel;
use super::logger::{Logger, LoggerBuilder};
use super::output_format::OutputFormat;
use super::overflow_policy::OverflowPolicy;
use super::sink::AppenderSink;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default value of the `version` field
pub const DEFAULT_VERSION: &str = "0.0.0";

/// Key of the version field added to every record
pub const VERSION_KEY: &str = "version";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Minimum level. Unrecognised values fall back to `info`.
    pub level: String,
    pub format: OutputFormat,
    pub version: String,
    /// Byte threshold for chunking string fields; 0 disables chunking
    pub max_field_size: usize,
    /// Queue size for the async sink worker. Synchronous when unset.
    pub async_buffer: Option<usize>,
    pub overflow_policy: OverflowPolicy,
    pub request_flush_timeout_ms: u64,
    pub exit_flush_timeout_ms: u64,
    pub error_tracker_flush_timeout_ms: Option<u64>,
    pub colors: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: OutputFormat::Json,
            version: DEFAULT_VERSION.to_string(),
            max_field_size: MAX_STRING_FIELD_SIZE,
            async_buffer: None,
            overflow_policy: OverflowPolicy::default(),
            request_flush_timeout_ms: 1_000,
            exit_flush_timeout_ms: 30_000,
            error_tracker_flush_timeout_ms: None,
            colors: false,
        }
    }
}

impl ObservabilityConfig {
    /// Human-readable colored text
    pub fn development(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: OutputFormat::Text,
            colors: true,
            ..Self::default()
        }
    }

    /// JSON lines through an async sink
    pub fn production(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: OutputFormat::Json,
            async_buffer: Some(10_000),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.async_buffer == Some(0) {
            return Err(ObservabilityError::config(
                "async_buffer",
                "queue size must be greater than zero",
            ));
        }
        if self.version.is_empty() {
            return Err(ObservabilityError::config("version", "must not be empty"));
        }
        Ok(())
    }

    pub fn request_flush_timeout(&self) -> Duration {
        Duration::from_millis(self.request_flush_timeout_ms)
    }

    pub fn exit_flush_timeout(&self) -> Duration {
        Duration::from_millis(self.exit_flush_timeout_ms)
    }

    /// Build a logger writing to stdout (stderr for Error and Fatal when
    /// the console appender is available)
    pub fn build(&self, builder: LoggerBuilder) -> Logger {
        self.build_with(builder, self.default_appender())
    }

    /// Apply this configuration on top of `builder` and build a logger
    /// writing to `appender`.
    ///
    /// An unparseable level is reported at Warn through the new logger.
    pub fn build_with(&self, builder: LoggerBuilder, appender: Box<dyn Appender>) -> Logger {
        let (level, level_error) = LogLevel::parse_or_default(&self.level);

        let sink = AppenderSink::builder()
            .boxed_appender(appender)
            .maybe_async(self.async_buffer)
            .overflow_policy(self.overflow_policy.clone())
            .build();

        let mut builder = builder
            .sink(sink)
            .min_level(level)
            .max_field_size(self.max_field_size)
            .request_flush_timeout(self.request_flush_timeout())
            .exit_flush_timeout(self.exit_flush_timeout())
            .field(Field::string(VERSION_KEY, self.version.clone()));
        if let Some(ms) = self.error_tracker_flush_timeout_ms {
            builder = builder.error_tracker_flush_timeout(Duration::from_millis(ms));
        }

        let logger = builder.build();
        if let Some(e) = level_error {
            logger.warn(
                "invalid log level, using info",
                [
                    Field::string("configured_level", self.level.clone()),
                    Field::string("error_message", e.to_string()),
                ],
            );
        }
        logger
    }

    #[cfg(feature = "console")]
    fn default_appender(&self) -> Box<dyn Appender> {
        Box::new(
            crate::appenders::ConsoleAppender::with_colors(self.colors)
                .with_output_format(self.format),
        )
    }

    #[cfg(not(feature = "console"))]
    fn default_appender(&self) -> Box<dyn Appender> {
        Box::new(crate::appenders::WriterAppender::stdout().with_output_format(self.format))
    }
}
