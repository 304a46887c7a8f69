//! Output formats for log records
//!
//! - Text: human-readable, for development
//! - Json: one object per line, for production log aggregation
//! - Logfmt: key=value pairs

use super::field::FieldValue;
use super::log_record::LogRecord;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Example: `2025-01-08T10:30:45.123Z [INFO ] Request processed status=200`
    #[default]
    Text,

    /// Example: `{"timestamp":"2025-01-08T10:30:45.123Z","level":"info","msg":"Request processed","status":200}`
    ///
    /// Fields follow `msg` in record order.
    Json,

    /// Example: `timestamp=2025-01-08T10:30:45.123Z level=info msg="Request processed" status=200`
    Logfmt,
}

impl OutputFormat {
    pub fn format(&self, record: &LogRecord) -> String {
        match self {
            OutputFormat::Text => self.format_text(record),
            OutputFormat::Json => self.format_json(record),
            OutputFormat::Logfmt => self.format_logfmt(record),
        }
    }

    /// ISO-8601 UTC with millisecond precision
    pub fn timestamp(record: &LogRecord) -> String {
        record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn format_text(&self, record: &LogRecord) -> String {
        let mut out = format!(
            "{} [{:5}] {}",
            Self::timestamp(record),
            record.level.to_str(),
            record.message
        );
        for field in &record.fields {
            out.push(' ');
            out.push_str(&LogRecord::sanitize(&field.to_string()));
        }
        out
    }

    fn format_json(&self, record: &LogRecord) -> String {
        // Written by hand so fields keep their order and duplicate keys survive
        let mut out = String::with_capacity(128);
        out.push_str("{\"timestamp\":");
        out.push_str(&json_string(&Self::timestamp(record)));
        out.push_str(",\"level\":");
        out.push_str(&json_string(record.level.as_lowercase()));
        out.push_str(",\"msg\":");
        out.push_str(&json_string(&record.message));

        for field in &record.fields {
            out.push(',');
            out.push_str(&json_string(field.key()));
            out.push(':');
            out.push_str(&serde_json::to_string(&field.value().to_json_value()).unwrap_or_default());
        }

        out.push('}');
        out
    }

    fn format_logfmt(&self, record: &LogRecord) -> String {
        let mut parts = Vec::with_capacity(record.fields.len() + 3);
        parts.push(format!("timestamp={}", Self::timestamp(record)));
        parts.push(format!("level={}", record.level.as_lowercase()));
        parts.push(format!("msg={}", quote_logfmt_value(&record.message)));

        for field in &record.fields {
            let value = match field.value() {
                FieldValue::Int(i) => i.to_string(),
                FieldValue::Bool(b) => b.to_string(),
                FieldValue::Float(f) => f.to_string(),
                FieldValue::String(s) => escape_logfmt_value(s),
                other => escape_logfmt_value(&other.to_string()),
            };
            parts.push(format!("{}={}", escape_logfmt_key(field.key()), value));
        }

        parts.join(" ")
    }
}

fn json_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_default()
}

fn escape_logfmt_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || *c == '.')
        .collect()
}

/// Quote when the value contains spaces, quotes, `=` or control whitespace
fn escape_logfmt_value(value: &str) -> String {
    if value.is_empty() || value.contains([' ', '"', '=', '\n', '\r', '\t']) {
        quote_logfmt_value(value)
    } else {
        value.to_string()
    }
}

fn quote_logfmt_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", LogRecord::sanitize(&escaped))
}
