//! Correlated logger
//!
//! A [`Logger`] writes structured records to a [`LogSink`] and keeps them
//! consistent with the rest of the request's telemetry:
//! - records carry `trace_id`/`span_id` of the active span when it is valid
//! - error fields at Warn and above are mirrored to the [`ErrorTracker`]
//! - oversized string fields are split over several records before the sink
//!   sees them
//!
//! Loggers are cheap to clone. Children share the sink, tracker and
//! deployment context of their parent and only add default fields.

use super::chunking::{chunk_oversized_fields, MAX_STRING_FIELD_SIZE};
use super::deployment::DeploymentInfo;
use super::field::{ErrorValue, Field};
use super::flush::{self, Deadline, FlushReport, DEFAULT_EXIT_FLUSH_TIMEOUT, DEFAULT_REQUEST_FLUSH_TIMEOUT};
use super::log_level::LogLevel;
use super::log_record::LogRecord;
use super::metadata::{project, span_attributes};
use super::scope::Scope;
use super::sink::{LogSink, NullSink};
use crate::telemetry::error_tracker::{ErrorReport, ErrorTracker, NoopErrorTracker};
use crate::telemetry::trace::{SpanContext, SpanStatus};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Key of the trace id field added to correlated records
pub const TRACE_ID_KEY: &str = "trace_id";

/// Key of the span id field added to correlated records
pub const SPAN_ID_KEY: &str = "span_id";

/// Runs after a Fatal record has been emitted and flushed
pub type FatalHook = Arc<dyn Fn() + Send + Sync>;

fn exit_process() -> FatalHook {
    Arc::new(|| std::process::exit(1))
}

struct LoggerCore {
    sink: Arc<dyn LogSink>,
    error_tracker: Arc<dyn ErrorTracker>,
    deployment: DeploymentInfo,
    min_level: LogLevel,
    max_field_size: usize,
    fatal_hook: FatalHook,
    request_flush_timeout: Duration,
    exit_flush_timeout: Duration,
    error_tracker_flush_timeout: Option<Duration>,
    /// Extra tags added to every error report, settable at runtime
    error_tags: RwLock<BTreeMap<String, String>>,
}

/// Structured logger correlated with the scope it is attached to
#[derive(Clone)]
pub struct Logger {
    core: Arc<LoggerCore>,
    defaults: Vec<Field>,
    attached: Option<Scope>,
}

impl Logger {
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    /// Logger that discards everything.
    ///
    /// Fatal records do not terminate the process.
    pub fn noop() -> Self {
        LoggerBuilder::new()
            .min_level(LogLevel::Fatal)
            .fatal_hook(|| {})
            .build()
    }

    /// The same logger without an attached scope
    pub fn detached(&self) -> Logger {
        Logger {
            core: Arc::clone(&self.core),
            defaults: self.defaults.clone(),
            attached: None,
        }
    }

    /// The same logger correlated with `scope`: its active span and metadata
    /// are added to every record
    pub fn attach(&self, scope: Scope) -> Logger {
        Logger {
            core: Arc::clone(&self.core),
            defaults: self.defaults.clone(),
            attached: Some(scope),
        }
    }

    /// New logger with `fields` appended to the defaults.
    ///
    /// Keys are not deduplicated.
    pub fn new_child(&self, fields: impl IntoIterator<Item = Field>) -> Logger {
        let mut child = self.clone();
        child.defaults.extend(fields);
        child
    }

    /// Append `fields` to this logger's defaults
    pub fn add_fields(&mut self, fields: impl IntoIterator<Item = Field>) {
        self.defaults.extend(fields);
    }

    pub fn defaults(&self) -> &[Field] {
        &self.defaults
    }

    pub fn scope(&self) -> Option<&Scope> {
        self.attached.as_ref()
    }

    pub fn min_level(&self) -> LogLevel {
        self.core.min_level
    }

    pub fn max_field_size(&self) -> usize {
        self.core.max_field_size
    }

    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.core.sink
    }

    pub fn error_tracker(&self) -> &Arc<dyn ErrorTracker> {
        &self.core.error_tracker
    }

    pub fn deployment(&self) -> &DeploymentInfo {
        &self.core.deployment
    }

    pub fn request_flush_timeout(&self) -> Duration {
        self.core.request_flush_timeout
    }

    pub fn exit_flush_timeout(&self) -> Duration {
        self.core.exit_flush_timeout
    }

    /// Upper bound for the error tracker flush stage, if configured
    pub fn error_tracker_flush_timeout(&self) -> Option<Duration> {
        self.core.error_tracker_flush_timeout
    }

    /// Add a tag to every later error report from this logger and the
    /// loggers sharing its sink
    pub fn add_error_tag(&self, key: impl Into<String>, value: impl Into<String>) {
        self.core.error_tags.write().insert(key.into(), value.into());
    }

    pub fn debug(&self, message: impl AsRef<str>, fields: impl IntoIterator<Item = Field>) {
        self.log(LogLevel::Debug, message, fields);
    }

    pub fn info(&self, message: impl AsRef<str>, fields: impl IntoIterator<Item = Field>) {
        self.log(LogLevel::Info, message, fields);
    }

    pub fn warn(&self, message: impl AsRef<str>, fields: impl IntoIterator<Item = Field>) {
        self.log(LogLevel::Warn, message, fields);
    }

    /// Log at Error and mark the active span as failed with `message`
    pub fn error(&self, message: impl AsRef<str>, fields: impl IntoIterator<Item = Field>) {
        self.log(LogLevel::Error, message, fields);
    }

    /// Log at Fatal, flush everything under the exit timeout, then run the
    /// fatal hook (by default the process exits with status 1)
    pub fn fatal(&self, message: impl AsRef<str>, fields: impl IntoIterator<Item = Field>) {
        self.log(LogLevel::Fatal, message, fields);
    }

    pub fn log(&self, level: LogLevel, message: impl AsRef<str>, fields: impl IntoIterator<Item = Field>) {
        if level < self.core.min_level {
            return;
        }

        let message = message.as_ref();
        let call_fields: Vec<Field> = fields.into_iter().collect();
        let span_context = self.attached.as_ref().and_then(Scope::span_context);

        if level.is_critical() {
            if let Some(span) = self.attached.as_ref().and_then(Scope::active_span) {
                span.record_error(message);
                span.set_status(SpanStatus::Error(message.to_string()));
            }
        }

        self.emit(level, message, &call_fields, span_context);

        if level.mirrors_errors() && self.core.error_tracker.is_enabled() {
            self.mirror_errors(level, message, &call_fields, span_context);
        }

        if level == LogLevel::Fatal {
            self.exit();
        }
    }

    fn emit(&self, level: LogLevel, message: &str, call_fields: &[Field], span_context: Option<SpanContext>) {
        let mut fields = Vec::with_capacity(self.defaults.len() + call_fields.len() + 2);
        fields.extend(self.defaults.iter().cloned());
        fields.extend(call_fields.iter().cloned());

        if let Some(metadata) = self.attached.as_ref().and_then(Scope::metadata) {
            fields.extend(project(&metadata));
        }

        if let Some(ctx) = span_context {
            fields.push(Field::string(TRACE_ID_KEY, ctx.trace_id.to_string()));
            fields.push(Field::string(SPAN_ID_KEY, ctx.span_id.to_string()));
        }

        let record = LogRecord::new(level, message, fields);
        match chunk_oversized_fields(&record.fields, self.core.max_field_size) {
            None => self.core.sink.write(record),
            Some(chunks) => self.core.sink.write_batch(
                chunks
                    .into_iter()
                    .map(|chunk| record.with_fields(chunk))
                    .collect(),
            ),
        }
    }

    fn mirror_errors(
        &self,
        level: LogLevel,
        message: &str,
        call_fields: &[Field],
        span_context: Option<SpanContext>,
    ) {
        let mut seen: Vec<&ErrorValue> = Vec::new();
        for error in call_fields.iter().flat_map(Field::errors) {
            if !seen.iter().any(|s| s.same_instance(error)) {
                seen.push(error);
            }
        }
        if seen.is_empty() {
            return;
        }

        let mut tags = self.core.deployment.tags();
        tags.extend(
            self.core
                .error_tags
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        for error in seen {
            let report = ErrorReport {
                error: error.clone(),
                message: message.to_string(),
                level,
                trace_id: span_context.map(|c| c.trace_id),
                span_id: span_context.map(|c| c.span_id),
                tags: tags.clone(),
            };

            if let Err(e) = self.core.error_tracker.capture_exception(&report) {
                // Plain string field: must not be mirrored again
                self.log(
                    LogLevel::Warn,
                    "failed to report error to error tracker",
                    [Field::string("error_message", e.to_string())],
                );
            }
        }
    }

    fn exit(&self) {
        let scope = self.attached.clone().unwrap_or_default();
        let report = flush::run(&scope, Some(self), Deadline::after(self.core.exit_flush_timeout));
        if !report.is_success() {
            eprintln!(
                "[LOGGER WARNING] Flush before exit incomplete: {} stage(s) failed",
                report.failures().len()
            );
        }
        (self.core.fatal_hook)();
    }

    /// Flush traces, metrics, error reports and the sink.
    ///
    /// Bounded by the attached scope's deadline, or the request flush timeout
    /// when it carries none.
    pub fn sync(&self) -> FlushReport {
        let scope = self.attached.clone().unwrap_or_default();
        let deadline = scope
            .deadline()
            .unwrap_or_else(|| Deadline::after(self.core.request_flush_timeout));
        flush::run(&scope, Some(self), deadline)
    }

    /// Copy the attached scope's metadata onto its active span
    pub fn set_span_attributes(&self) {
        let Some(scope) = &self.attached else {
            return;
        };
        if let (Some(span), Some(metadata)) = (scope.active_span(), scope.metadata()) {
            span.set_attributes(&span_attributes(&metadata));
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("sink", &self.core.sink.name())
            .field("min_level", &self.core.min_level)
            .field("defaults", &self.defaults.len())
            .field("attached", &self.attached.is_some())
            .finish()
    }
}

/// Builder for [`Logger`]
///
/// # Example
/// ```
/// use rust_correlated_logger::prelude::*;
/// use std::time::Duration;
///
/// let memory = MemoryAppender::new();
/// let logger = Logger::builder()
///     .min_level(LogLevel::Debug)
///     .sink(AppenderSink::builder().appender(memory.clone()).build())
///     .field(Field::string("version", "1.2.3"))
///     .exit_flush_timeout(Duration::from_secs(5))
///     .build();
///
/// logger.info("started", []);
/// assert_eq!(memory.records()[0].str_field("version"), Some("1.2.3"));
/// ```
pub struct LoggerBuilder {
    sink: Option<Arc<dyn LogSink>>,
    error_tracker: Option<Arc<dyn ErrorTracker>>,
    deployment: DeploymentInfo,
    min_level: LogLevel,
    max_field_size: usize,
    fatal_hook: Option<FatalHook>,
    request_flush_timeout: Duration,
    exit_flush_timeout: Duration,
    error_tracker_flush_timeout: Option<Duration>,
    fields: Vec<Field>,
    error_tags: BTreeMap<String, String>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            sink: None,
            error_tracker: None,
            deployment: DeploymentInfo::default(),
            min_level: LogLevel::Info,
            max_field_size: MAX_STRING_FIELD_SIZE,
            fatal_hook: None,
            request_flush_timeout: DEFAULT_REQUEST_FLUSH_TIMEOUT,
            exit_flush_timeout: DEFAULT_EXIT_FLUSH_TIMEOUT,
            error_tracker_flush_timeout: None,
            fields: Vec::new(),
            error_tags: BTreeMap::new(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn sink<S: LogSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shared_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Without a tracker error fields are logged but not mirrored
    #[must_use = "builder methods return a new value"]
    pub fn error_tracker<T: ErrorTracker + 'static>(mut self, tracker: T) -> Self {
        self.error_tracker = Some(Arc::new(tracker));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shared_error_tracker(mut self, tracker: Arc<dyn ErrorTracker>) -> Self {
        self.error_tracker = Some(tracker);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn deployment(mut self, deployment: DeploymentInfo) -> Self {
        self.deployment = deployment;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Byte threshold above which string fields are chunked. 0 disables chunking.
    #[must_use = "builder methods return a new value"]
    pub fn max_field_size(mut self, size: usize) -> Self {
        self.max_field_size = size;
        self
    }

    /// Replace the process exit that follows a Fatal record
    #[must_use = "builder methods return a new value"]
    pub fn fatal_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.fatal_hook = Some(Arc::new(hook));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn request_flush_timeout(mut self, timeout: Duration) -> Self {
        self.request_flush_timeout = timeout;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn exit_flush_timeout(mut self, timeout: Duration) -> Self {
        self.exit_flush_timeout = timeout;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn error_tracker_flush_timeout(mut self, timeout: Duration) -> Self {
        self.error_tracker_flush_timeout = Some(timeout);
        self
    }

    /// Default field added to every record
    #[must_use = "builder methods return a new value"]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn error_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.error_tags.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Logger {
        let core = LoggerCore {
            sink: self.sink.unwrap_or_else(|| Arc::new(NullSink)),
            error_tracker: self
                .error_tracker
                .unwrap_or_else(|| Arc::new(NoopErrorTracker)),
            deployment: self.deployment,
            min_level: self.min_level,
            max_field_size: self.max_field_size,
            fatal_hook: self.fatal_hook.unwrap_or_else(exit_process),
            request_flush_timeout: self.request_flush_timeout,
            exit_flush_timeout: self.exit_flush_timeout,
            error_tracker_flush_timeout: self.error_tracker_flush_timeout,
            error_tags: RwLock::new(self.error_tags),
        };

        Logger {
            core: Arc::new(core),
            defaults: self.fields,
            attached: None,
        }
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
