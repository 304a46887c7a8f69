//! Typed key/value fields attached to log records
//!
//! This module provides:
//! - `Field`: one immutable key/value entry
//! - `FieldValue`: the closed set of value kinds a field may carry
//! - `ErrorValue`: a shareable error, the only kind mirrored to the error tracker
//! - `LogFields`: a builder for the nested agent/service/repository/error layout

use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Key used by [`Field::err`]
pub const ERROR_KEY: &str = "error";

/// Key used by [`Field::trace`]
pub const STACK_TRACE_KEY: &str = "trace";

/// An error shared between the log record and the error tracker
#[derive(Clone)]
pub struct ErrorValue {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for MessageError {}

impl ErrorValue {
    pub fn new<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(err),
        }
    }

    pub fn from_boxed(err: Box<dyn StdError + Send + Sync + 'static>) -> Self {
        Self {
            inner: Arc::from(err),
        }
    }

    pub fn from_arc(err: Arc<dyn StdError + Send + Sync + 'static>) -> Self {
        Self { inner: err }
    }

    /// An error carrying only a message
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(MessageError(message.into()))
    }

    pub fn message(&self) -> String {
        self.inner.to_string()
    }

    pub fn error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.inner.as_ref()
    }

    /// Messages of the error and each of its sources, outermost first
    pub fn chain(&self) -> Vec<String> {
        let mut chain = vec![self.inner.to_string()];
        let mut source = self.inner.source();
        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }
        chain
    }

    /// Whether both values refer to the same error instance
    pub fn same_instance(&self, other: &ErrorValue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorValue").field(&self.message()).finish()
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl PartialEq for ErrorValue {
    fn eq(&self, other: &Self) -> bool {
        self.same_instance(other) || self.message() == other.message()
    }
}

/// Value type for structured logging fields
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Bool(bool),
    Float(f64),
    Duration(Duration),
    Error(ErrorValue),
    ErrorList(Vec<ErrorValue>),
    Any(serde_json::Value),
}

impl FieldValue {
    /// Convert to serde_json::Value for JSON serialization
    #[must_use]
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            FieldValue::String(s) => serde_json::Value::String(s.clone()),
            FieldValue::Int(i) => serde_json::Value::Number((*i).into()),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Duration(d) => serde_json::Value::String(format!("{:?}", d)),
            FieldValue::Error(e) => serde_json::Value::String(e.message()),
            FieldValue::ErrorList(errs) => serde_json::Value::Array(
                errs.iter()
                    .map(|e| serde_json::Value::String(e.message()))
                    .collect(),
            ),
            FieldValue::Any(v) => v.clone(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FieldValue::Error(_) | FieldValue::ErrorList(_))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Duration(d) => write!(f, "{:?}", d),
            FieldValue::Error(e) => write!(f, "{}", e),
            FieldValue::ErrorList(errs) => {
                let joined = errs
                    .iter()
                    .map(ErrorValue::message)
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "[{}]", joined)
            }
            FieldValue::Any(v) => write!(f, "{}", v),
        }
    }
}

/// One typed key/value entry in a log record.
///
/// Fields are immutable once built; the constructor functions are the only
/// way to produce one.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    key: String,
    value: FieldValue,
}

impl Field {
    fn new(key: impl Into<String>, value: FieldValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn string(key: impl Into<String>, val: impl Into<String>) -> Self {
        Self::new(key, FieldValue::String(val.into()))
    }

    pub fn strings<S: Into<String>>(key: impl Into<String>, vals: impl IntoIterator<Item = S>) -> Self {
        let items = vals
            .into_iter()
            .map(|s| serde_json::Value::String(s.into()))
            .collect();
        Self::new(key, FieldValue::Any(serde_json::Value::Array(items)))
    }

    pub fn int(key: impl Into<String>, val: impl Into<i64>) -> Self {
        Self::new(key, FieldValue::Int(val.into()))
    }

    pub fn int64(key: impl Into<String>, val: i64) -> Self {
        Self::new(key, FieldValue::Int(val))
    }

    pub fn ints(key: impl Into<String>, vals: impl IntoIterator<Item = i64>) -> Self {
        let items = vals.into_iter().map(|i| serde_json::Value::from(i)).collect();
        Self::new(key, FieldValue::Any(serde_json::Value::Array(items)))
    }

    pub fn bool(key: impl Into<String>, val: bool) -> Self {
        Self::new(key, FieldValue::Bool(val))
    }

    pub fn bools(key: impl Into<String>, vals: impl IntoIterator<Item = bool>) -> Self {
        let items = vals.into_iter().map(serde_json::Value::Bool).collect();
        Self::new(key, FieldValue::Any(serde_json::Value::Array(items)))
    }

    pub fn float(key: impl Into<String>, val: f64) -> Self {
        Self::new(key, FieldValue::Float(val))
    }

    pub fn duration(key: impl Into<String>, val: Duration) -> Self {
        Self::new(key, FieldValue::Duration(val))
    }

    pub fn durations(key: impl Into<String>, vals: impl IntoIterator<Item = Duration>) -> Self {
        let items = vals
            .into_iter()
            .map(|d| serde_json::Value::String(format!("{:?}", d)))
            .collect();
        Self::new(key, FieldValue::Any(serde_json::Value::Array(items)))
    }

    /// Error field under the `error` key
    pub fn err<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::new(ERROR_KEY, FieldValue::Error(ErrorValue::new(err)))
    }

    /// Error field from an already shared error value
    pub fn err_value(err: ErrorValue) -> Self {
        Self::new(ERROR_KEY, FieldValue::Error(err))
    }

    pub fn errs(key: impl Into<String>, errs: impl IntoIterator<Item = ErrorValue>) -> Self {
        Self::new(key, FieldValue::ErrorList(errs.into_iter().collect()))
    }

    /// Arbitrary serializable value.
    ///
    /// Values that fail to serialize are logged as a string describing the failure.
    pub fn any<T: Serialize + ?Sized>(key: impl Into<String>, val: &T) -> Self {
        let value = serde_json::to_value(val).unwrap_or_else(|e| {
            serde_json::Value::String(format!("<unserializable: {}>", e))
        });
        Self::new(key, FieldValue::Any(value))
    }

    /// Stack trace bytes under the `trace` key
    pub fn trace(trace: &[u8]) -> Self {
        Self::new(
            STACK_TRACE_KEY,
            FieldValue::String(String::from_utf8_lossy(trace).into_owned()),
        )
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// Same key, new value. Used by the chunker when replacing oversized strings.
    pub(crate) fn with_value(&self, value: FieldValue) -> Self {
        Self::new(self.key.clone(), value)
    }

    /// Errors carried by this field, in order
    pub fn errors(&self) -> &[ErrorValue] {
        match &self.value {
            FieldValue::Error(e) => std::slice::from_ref(e),
            FieldValue::ErrorList(errs) => errs,
            _ => &[],
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Categories for the `error.type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    Unknown,
    Validation,
    Agent,
    System,
    PostScan,
    PreScan,
    Scan,
    Config,
    Network,
    Timeout,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Unknown => "unknown_error",
            ErrorType::Validation => "validation_error",
            ErrorType::Agent => "agent_error",
            ErrorType::System => "system_error",
            ErrorType::PostScan => "postscan_error",
            ErrorType::PreScan => "prescan_error",
            ErrorType::Scan => "scan_error",
            ErrorType::Config => "config_error",
            ErrorType::Network => "network_error",
            ErrorType::Timeout => "timeout_error",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for the nested agent/service/repository/error field layout
///
/// # Example
///
/// ```
/// use rust_correlated_logger::core::{ErrorType, LogFields};
///
/// let fields = LogFields::new()
///     .with_agent("triage", "running")
///     .with_repository("api", "github", "12345")
///     .with_error(ErrorType::Agent, "model timed out")
///     .build();
///
/// assert_eq!(fields.len(), 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogFields {
    agent: serde_json::Map<String, serde_json::Value>,
    service: serde_json::Map<String, serde_json::Value>,
    repository: serde_json::Map<String, serde_json::Value>,
    error_type: Option<ErrorType>,
    error_message: Option<String>,
    error_traceback: Option<String>,
}

fn put(map: &mut serde_json::Map<String, serde_json::Value>, key: &str, value: impl Into<String>) {
    map.insert(key.to_string(), serde_json::Value::String(value.into()));
}

impl LogFields {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_agent(mut self, name: impl Into<String>, status: impl Into<String>) -> Self {
        put(&mut self.agent, "name", name);
        put(&mut self.agent, "status", status);
        self
    }

    #[must_use]
    pub fn with_service(mut self, name: impl Into<String>) -> Self {
        put(&mut self.service, "name", name);
        self
    }

    #[must_use]
    pub fn with_service_tool(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        put(&mut self.service, "tool_name", name);
        put(&mut self.service, "tool_version", version);
        self
    }

    #[must_use]
    pub fn with_service_category(mut self, category: impl Into<String>) -> Self {
        put(&mut self.service, "category", category);
        self
    }

    #[must_use]
    pub fn with_repository(
        mut self,
        name: impl Into<String>,
        platform: impl Into<String>,
        installation_id: impl Into<String>,
    ) -> Self {
        put(&mut self.repository, "name", name);
        put(&mut self.repository, "platform", platform);
        put(&mut self.repository, "installation_id", installation_id);
        self
    }

    #[must_use]
    pub fn with_repository_owner(mut self, owner: impl Into<String>) -> Self {
        put(&mut self.repository, "owner", owner);
        self
    }

    #[must_use]
    pub fn with_error(mut self, error_type: ErrorType, message: impl Into<String>) -> Self {
        self.error_type = Some(error_type);
        self.error_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_error_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.error_traceback = Some(traceback.into());
        self
    }

    pub fn build(self) -> Vec<Field> {
        let mut fields = Vec::new();
        for (key, group) in [
            ("agent", self.agent),
            ("service", self.service),
            ("repository", self.repository),
        ] {
            if !group.is_empty() {
                fields.push(Field::new(key, FieldValue::Any(serde_json::Value::Object(group))));
            }
        }
        if let Some(error_type) = self.error_type {
            fields.push(Field::string("error.type", error_type.as_str()));
        }
        if let Some(message) = self.error_message {
            fields.push(Field::string("error.message", message));
        }
        if let Some(traceback) = self.error_traceback {
            fields.push(Field::string("error.traceback", traceback));
        }
        fields
    }
}
