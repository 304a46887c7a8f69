//! Appender over any byte writer

use crate::core::{Appender, LogRecord, OutputFormat, Result};
use parking_lot::Mutex;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;

/// Writes one formatted line per record to a [`Write`] destination.
///
/// Output is buffered; it reaches the destination on flush.
pub struct WriterAppender {
    writer: BufWriter<Box<dyn Write + Send + Sync>>,
    output_format: OutputFormat,
    name: String,
}

impl WriterAppender {
    pub fn new<W: Write + Send + Sync + 'static>(writer: W) -> Self {
        Self {
            writer: BufWriter::new(Box::new(writer)),
            output_format: OutputFormat::Json,
            name: "writer".to_string(),
        }
    }

    /// JSON lines on stdout
    pub fn stdout() -> Self {
        Self::new(io::stdout()).with_name("stdout")
    }

    /// JSON lines on stderr
    pub fn stderr() -> Self {
        Self::new(io::stderr()).with_name("stderr")
    }

    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Appender for WriterAppender {
    fn append(&mut self, record: &LogRecord) -> Result<()> {
        let line = self.output_format.format(record);
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// In-memory byte buffer that can be handed to a [`WriterAppender`] and read
/// back later. Cloning shares the buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Field, LogLevel};

    #[test]
    fn test_buffered_until_flush() -> Result<()> {
        let buffer = SharedBuffer::new();
        let mut appender = WriterAppender::new(buffer.clone());

        appender.append(&LogRecord::new(LogLevel::Info, "one", vec![Field::bool("ok", true)]))?;
        assert!(buffer.contents().is_empty());

        appender.flush()?;
        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(&lines[0])?;
        assert_eq!(parsed["msg"], "one");
        assert_eq!(parsed["ok"], true);
        Ok(())
    }

    #[test]
    fn test_logfmt_output() -> Result<()> {
        let buffer = SharedBuffer::new();
        let mut appender = WriterAppender::new(buffer.clone())
            .with_output_format(OutputFormat::Logfmt)
            .with_name("audit");
        assert_eq!(appender.name(), "audit");

        appender.append(&LogRecord::new(LogLevel::Debug, "two", Vec::new()))?;
        appender.flush()?;
        assert!(buffer.contents().contains("level=debug msg=\"two\""));
        Ok(())
    }
}
