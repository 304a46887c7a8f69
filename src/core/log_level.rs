//! Log level definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::ObservabilityError;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 1,
    #[default]
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl LogLevel {
    pub fn to_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Lowercase name used by the JSON encoder
    pub fn as_lowercase(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }

    /// Whether error-typed fields logged at this level are mirrored to the error tracker
    #[inline]
    pub fn mirrors_errors(&self) -> bool {
        *self >= LogLevel::Warn
    }

    /// Error and Fatal records are never dropped by the async sink
    #[inline]
    pub fn is_critical(&self) -> bool {
        *self >= LogLevel::Error
    }

    /// Parse a level, falling back to `Info` when the input is not recognised.
    ///
    /// The parse error is returned alongside so the caller can report it once
    /// a logger exists.
    pub fn parse_or_default(s: &str) -> (Self, Option<ObservabilityError>) {
        match s.parse() {
            Ok(level) => (level, None),
            Err(err) => (LogLevel::Info, Some(err)),
        }
    }

    #[cfg(feature = "console")]
    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            LogLevel::Debug => Blue,
            LogLevel::Info => Green,
            LogLevel::Warn => Yellow,
            LogLevel::Error => Red,
            LogLevel::Fatal => BrightRed,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for LogLevel {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(ObservabilityError::config(
                "log level",
                format!("unrecognized level '{}'", s),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Fatal);
    }

    #[test]
    fn test_mirroring_levels() {
        assert!(!LogLevel::Debug.mirrors_errors());
        assert!(!LogLevel::Info.mirrors_errors());
        assert!(LogLevel::Warn.mirrors_errors());
        assert!(LogLevel::Error.mirrors_errors());
        assert!(LogLevel::Fatal.mirrors_errors());
    }

    #[test]
    fn test_parse_or_default() {
        assert_eq!(LogLevel::parse_or_default("debug").0, LogLevel::Debug);
        assert_eq!(LogLevel::parse_or_default(" Warning ").0, LogLevel::Warn);

        let (level, err) = LogLevel::parse_or_default("loud");
        assert_eq!(level, LogLevel::Info);
        assert!(err.is_some());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&LogLevel::Error).unwrap();
        assert_eq!(json, "\"error\"");
        let level: LogLevel = serde_json::from_str("\"fatal\"").unwrap();
        assert_eq!(level, LogLevel::Fatal);
    }
}
