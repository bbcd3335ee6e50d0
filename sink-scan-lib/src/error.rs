//! Error handling for sink scanning operations.
//!
//! This module defines a single error type covering every way a scan run can
//! fail, from an uncompilable pattern at startup to a single URL that could not
//! be fetched mid-run.

use std::fmt;
use std::time::Duration;

/// Main error type for sink scanning operations.
///
/// Variants fall into three classes:
/// - initialization failures (`PatternCompile`, `OutputFile`, `ConfigError`,
///   `FileError`) which halt the run before any URL is dispatched,
/// - per-URL failures (`FetchError`, `Timeout`) which are isolated to one task,
/// - `InputRead`, reported to the caller once the run has drained.
#[derive(Debug, Clone)]
pub enum ScanError {
    /// A sink pattern failed to compile
    PatternCompile {
        name: String,
        pattern: String,
        message: String,
    },

    /// The secondary output file could not be opened or written
    OutputFile { path: String, message: String },

    /// Configuration errors (invalid settings, unknown preset, etc.)
    ConfigError { message: String },

    /// File I/O errors when reading configuration or pattern files
    FileError { path: String, message: String },

    /// Retrieval of one URL failed (transport, body read, HTTP client setup)
    FetchError {
        url: String,
        message: String,
        status_code: Option<u16>,
    },

    /// A fetch exceeded its configured deadline
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// Reading the URL input stream failed mid-run
    InputRead { message: String },

    /// A report block could not be written to a sink after startup
    ReportWrite { sink: String, message: String },

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

impl ScanError {
    /// Create a new pattern compile error.
    pub fn pattern_compile<N, P, M>(name: N, pattern: P, message: M) -> Self
    where
        N: Into<String>,
        P: Into<String>,
        M: Into<String>,
    {
        Self::PatternCompile {
            name: name.into(),
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Create a new output file error.
    pub fn output_file<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::OutputFile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new fetch error.
    pub fn fetch<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::FetchError {
            url: url.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a new fetch error carrying the HTTP status that was received.
    pub fn fetch_with_status<U: Into<String>, M: Into<String>>(
        url: U,
        message: M,
        status_code: u16,
    ) -> Self {
        Self::FetchError {
            url: url.into(),
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new input read error.
    pub fn input_read<M: Into<String>>(message: M) -> Self {
        Self::InputRead {
            message: message.into(),
        }
    }

    /// Create a new report write error.
    pub fn report_write<S: Into<String>, M: Into<String>>(sink: S, message: M) -> Self {
        Self::ReportWrite {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error must stop the process before any URL is dispatched.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::PatternCompile { .. }
                | Self::OutputFile { .. }
                | Self::ConfigError { .. }
                | Self::FileError { .. }
        )
    }

    /// Whether this error is scoped to a single URL task.
    pub fn is_task_scoped(&self) -> bool {
        matches!(self, Self::FetchError { .. } | Self::Timeout { .. })
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PatternCompile {
                name,
                pattern,
                message,
            } => {
                write!(
                    f,
                    "Failed to compile pattern '{}' ({}): {}",
                    name, pattern, message
                )
            }
            Self::OutputFile { path, message } => {
                write!(f, "Output file error at '{}': {}", path, message)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::FetchError {
                url,
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "Fetch error for '{}' (HTTP {}): {}", url, code, message)
                } else {
                    write!(f, "Fetch error for '{}': {}", url, message)
                }
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::InputRead { message } => {
                write!(f, "Input read error: {}", message)
            }
            Self::ReportWrite { sink, message } => {
                write!(f, "Failed to write report to {}: {}", sink, message)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for ScanError {}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());

        match err.status() {
            Some(status) => Self::fetch_with_status(url, err.to_string(), status.as_u16()),
            None if err.is_connect() => {
                Self::fetch(url, format!("Connection failed: {}", err))
            }
            None => Self::fetch(url, format!("HTTP request failed: {}", err)),
        }
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

impl From<regex::Error> for ScanError {
    fn from(err: regex::Error) -> Self {
        Self::Internal {
            message: format!("Regex error: {}", err),
        }
    }
}

impl From<toml::de::Error> for ScanError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError {
            message: format!("Failed to parse TOML: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ScanError::pattern_compile("eval", "eval(", "unclosed group").is_fatal());
        assert!(ScanError::output_file("/nope/out.txt", "permission denied").is_fatal());
        assert!(ScanError::config("bad").is_fatal());
        assert!(!ScanError::fetch("http://x", "refused").is_fatal());
        assert!(!ScanError::input_read("broken pipe").is_fatal());
        assert!(!ScanError::report_write("stdout", "broken pipe").is_fatal());
        assert!(!ScanError::report_write("stdout", "broken pipe").is_task_scoped());
    }

    #[test]
    fn test_task_scoped_classification() {
        assert!(ScanError::fetch("http://x", "refused").is_task_scoped());
        assert!(ScanError::timeout("fetch http://x", Duration::from_secs(3)).is_task_scoped());
        assert!(!ScanError::internal("oops").is_task_scoped());
    }

    #[test]
    fn test_display_names_offending_pattern() {
        let err = ScanError::pattern_compile("eval", "eval(", "unclosed group");
        let msg = err.to_string();
        assert!(msg.contains("'eval'"));
        assert!(msg.contains("eval("));
    }

    #[test]
    fn test_display_fetch_with_status() {
        let err = ScanError::fetch_with_status("http://example.test/", "server error", 503);
        assert_eq!(
            err.to_string(),
            "Fetch error for 'http://example.test/' (HTTP 503): server error"
        );
    }
}
