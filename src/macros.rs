//! Logging macros with `format!`-style messages.
//!
//! Fields follow the format arguments after a semicolon.
//!
//! # Examples
//!
//! ```
//! use rust_correlated_logger::prelude::*;
//! use rust_correlated_logger::info;
//!
//! let logger = Logger::noop();
//!
//! info!(logger, "Server started");
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! info!(logger, "Request from {}", "10.0.0.1"; Field::int("status", 200), Field::string("path", "/"));
//! ```

/// Log at the given level.
///
/// # Examples
///
/// ```
/// # use rust_correlated_logger::prelude::*;
/// # let logger = Logger::noop();
/// use rust_correlated_logger::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Warn, "Error code: {}", 500; Field::string("component", "db"));
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $fmt:literal $(, $arg:expr)* ; $($field:expr),+) => {
        $logger.log($level, format!($fmt $(, $arg)*), [$($field),+])
    };
    ($logger:expr, $level:expr, $fmt:literal $(, $arg:expr)*) => {
        $logger.log(
            $level,
            format!($fmt $(, $arg)*),
            ::std::iter::empty::<$crate::core::Field>(),
        )
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::LogLevel::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::LogLevel::Info, $($arg)+)
    };
}

/// Log at Warn. Error fields are mirrored to the error tracker.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::LogLevel::Warn, $($arg)+)
    };
}

/// Log at Error and mark the active span as failed.
///
/// # Examples
///
/// ```
/// # use rust_correlated_logger::prelude::*;
/// # let logger = Logger::noop();
/// use rust_correlated_logger::error;
/// let err = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
/// error!(logger, "Failed to connect to {}", "db-1"; Field::err(err));
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::LogLevel::Error, $($arg)+)
    };
}

/// Log at Fatal, flush, then run the logger's fatal hook.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::core::LogLevel::Fatal, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::appenders::MemoryAppender;
    use crate::core::{AppenderSink, Field, LogLevel, Logger};

    fn logger() -> (Logger, MemoryAppender) {
        let memory = MemoryAppender::new();
        let logger = Logger::builder()
            .min_level(LogLevel::Debug)
            .sink(AppenderSink::builder().appender(memory.clone()).build())
            .fatal_hook(|| {})
            .build();
        (logger, memory)
    }

    #[test]
    fn test_log_macro() {
        let (logger, memory) = logger();
        log!(logger, LogLevel::Info, "Test message");
        log!(logger, LogLevel::Info, "Formatted: {}", 42);
        assert_eq!(memory.messages(), vec!["Test message", "Formatted: 42"]);
    }

    #[test]
    fn test_level_macros() {
        let (logger, memory) = logger();
        debug!(logger, "Count: {}", 5);
        info!(logger, "Items: {}", 100);
        warn!(logger, "Retry {} of {}", 1, 3);
        error!(logger, "Code: {}", 500);
        fatal!(logger, "Critical failure: {}", "system");

        let levels: Vec<_> = memory.records().iter().map(|r| r.level).collect();
        assert_eq!(
            levels,
            vec![
                LogLevel::Debug,
                LogLevel::Info,
                LogLevel::Warn,
                LogLevel::Error,
                LogLevel::Fatal
            ]
        );
    }

    #[test]
    fn test_macro_fields() {
        let (logger, memory) = logger();
        info!(logger, "user {}", "alice"; Field::int("attempt", 2), Field::bool("admin", false));

        let record = &memory.records()[0];
        assert_eq!(record.message, "user alice");
        assert_eq!(record.fields.len(), 2);
        assert_eq!(record.field("attempt").and_then(|f| f.value().as_int()), Some(2));
    }
}
