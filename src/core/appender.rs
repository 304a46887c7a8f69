//! Appender trait for byte-level log destinations

use super::{error::Result, log_record::LogRecord};

/// Encodes and writes records. Used by [`AppenderSink`](super::sink::AppenderSink),
/// which isolates appenders from each other's failures.
pub trait Appender: Send + Sync {
    fn append(&mut self, record: &LogRecord) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn name(&self) -> &str;
}
