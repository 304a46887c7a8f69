//! Core types: fields, records, scopes, the correlated logger and its sink

pub mod appender;
pub mod chunking;
pub mod config;
pub mod deployment;
pub mod error;
pub mod field;
pub mod flush;
pub mod log_level;
pub mod log_record;
pub mod logger;
pub mod metadata;
pub mod metrics;
pub mod output_format;
pub mod overflow_policy;
pub mod root;
pub mod scope;
pub mod sink;

pub use appender::Appender;
pub use chunking::{
    chunk_oversized_fields, chunk_string, truncate_field_value, MAX_STRING_FIELD_SIZE,
    TRUNCATION_SUFFIX,
};
pub use config::ObservabilityConfig;
pub use deployment::{format_logs_url, DeploymentInfo, DeploymentPlatform};
pub use error::{ObservabilityError, Result};
pub use field::{ErrorType, ErrorValue, Field, FieldValue, LogFields};
pub use flush::{
    bounded_flush, flush, flush_with_replaced_timeout, flush_with_timeout, Deadline, FlushReport, FlushStage,
    StageOutcome, DEFAULT_EXIT_FLUSH_TIMEOUT, DEFAULT_REQUEST_FLUSH_TIMEOUT,
};
pub use log_level::LogLevel;
pub use log_record::LogRecord;
pub use logger::{FatalHook, Logger, LoggerBuilder, SPAN_ID_KEY, TRACE_ID_KEY};
pub use metadata::{merge, project, span_attributes, Agent, MetadataRecord, Platform, Repository, Service, Tool};
pub use metrics::SinkMetrics;
pub use output_format::OutputFormat;
pub use overflow_policy::{OverflowCallback, OverflowPolicy};
pub use root::RootGuard;
pub use scope::{ObservabilityHandles, Scope};
pub use sink::{AppenderSink, AppenderSinkBuilder, LogSink, NullSink, DEFAULT_SHUTDOWN_TIMEOUT};
