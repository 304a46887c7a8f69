//! # Rust Correlated Logger
//!
//! Request-scoped observability: a structured logger, a tracer and a meter
//! bound to one [`Scope`] and kept consistent with each other.
//!
//! ## Features
//!
//! - **Trace correlation**: records carry the active span's `trace_id` and `span_id`
//! - **Error mirroring**: error fields at Warn and above are reported to an error tracker
//! - **Oversized fields**: long strings are split across records before they reach the sink
//! - **Metadata merge**: repository/service/tool details accumulate without being erased
//! - **Ordered flush**: traces, metrics, error reports, then logs, each under a deadline
//!
//! ```
//! use rust_correlated_logger::prelude::*;
//! use std::sync::Arc;
//!
//! let memory = MemoryAppender::new();
//! let logger = Logger::builder()
//!     .sink(AppenderSink::builder().appender(memory.clone()).build())
//!     .build();
//! let tracer = TracerHandle::new(Arc::new(InMemoryTracerProvider::new()), "checkout");
//!
//! let scope = Scope::new().bind(ObservabilityHandles::new(logger, tracer, MeterHandle::noop()));
//! let (scope, _span) = start_span(&scope, "handle_request");
//!
//! scope.logger().unwrap().info("charged card", [Field::int("amount", 1299)]);
//!
//! assert!(memory.records()[0].has_field("trace_id"));
//! ```

pub mod appenders;
pub mod core;
pub mod macros;
pub mod telemetry;

pub mod prelude {
    #[cfg(feature = "console")]
    pub use crate::appenders::ConsoleAppender;
    pub use crate::appenders::{FileAppender, MemoryAppender, WriterAppender};
    pub use crate::core::{
        Appender, AppenderSink, Deadline, DeploymentInfo, ErrorValue, Field, FieldValue,
        FlushReport, LogLevel, LogRecord, LogSink, Logger, LoggerBuilder, MetadataRecord,
        ObservabilityConfig, ObservabilityError, ObservabilityHandles, OutputFormat,
        OverflowPolicy, Repository, Result, RootGuard, Scope, Service,
    };
    pub use crate::telemetry::{
        start_root_span, start_span, ErrorTracker, InMemoryTracerProvider, MeterHandle,
        RecordingErrorTracker, TracerHandle,
    };
}

pub use crate::core::{
    Field, LogLevel, Logger, LoggerBuilder, MetadataRecord, ObservabilityError, Result, Scope,
};
