//! Console appender implementation

use crate::core::{Appender, LogLevel, LogRecord, OutputFormat, Result};
use colored::Colorize;

pub struct ConsoleAppender {
    use_colors: bool,
    output_format: OutputFormat,
}

impl ConsoleAppender {
    pub fn new() -> Self {
        Self {
            use_colors: true,
            output_format: OutputFormat::default(),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self {
            use_colors,
            output_format: OutputFormat::default(),
        }
    }

    /// Set the output format for this appender
    ///
    /// # Example
    ///
    /// ```
    /// use rust_correlated_logger::appenders::ConsoleAppender;
    /// use rust_correlated_logger::core::OutputFormat;
    ///
    /// let appender = ConsoleAppender::new()
    ///     .with_output_format(OutputFormat::Json);
    /// ```
    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    fn format_text(&self, record: &LogRecord) -> String {
        let level = format!("{:5}", record.level.to_str());
        let level = if self.use_colors {
            level.color(record.level.color_code()).to_string()
        } else {
            level
        };

        let mut out = format!(
            "{} [{}] {}",
            OutputFormat::timestamp(record),
            level,
            record.message
        );
        for field in &record.fields {
            out.push(' ');
            out.push_str(&LogRecord::sanitize(&field.to_string()));
        }
        out
    }
}

impl Default for ConsoleAppender {
    fn default() -> Self {
        Self::new()
    }
}

impl Appender for ConsoleAppender {
    fn append(&mut self, record: &LogRecord) -> Result<()> {
        let output = match self.output_format {
            OutputFormat::Text => self.format_text(record),
            OutputFormat::Json | OutputFormat::Logfmt => self.output_format.format(record),
        };

        // Error and Fatal go to stderr
        match record.level {
            LogLevel::Error | LogLevel::Fatal => eprintln!("{}", output),
            _ => println!("{}", output),
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        use std::io::Write;
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
