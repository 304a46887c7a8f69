//! Log record structure

use super::field::Field;
use super::log_level::LogLevel;
use chrono::{DateTime, Utc};

/// One emitted structured log line.
///
/// Built fresh for every log call and never mutated after it is handed to a
/// sink.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub fields: Vec<Field>,
}

impl LogRecord {
    /// Sanitize text to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// to prevent attackers from injecting fake log entries.
    pub(crate) fn sanitize(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(level: LogLevel, message: impl AsRef<str>, fields: Vec<Field>) -> Self {
        Self {
            level,
            message: Self::sanitize(message.as_ref()),
            timestamp: Utc::now(),
            fields,
        }
    }

    /// Same level, message and timestamp with a different field set
    pub(crate) fn with_fields(&self, fields: Vec<Field>) -> Self {
        Self {
            level: self.level,
            message: self.message.clone(),
            timestamp: self.timestamp,
            fields,
        }
    }

    /// First field with the given key
    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.key() == key)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    /// String value of the first field with the given key
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(|f| f.value().as_str())
    }
}
