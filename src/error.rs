//! Error types for scanchanges.

use thiserror::Error;

/// Main error type for the scanning library.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Malformed UTC offset '{0}': expected [+-]HHMM")]
    MalformedOffset(String),

    #[error("Malformed log entry #{index}: {reason}")]
    MalformedLogEntry { index: usize, reason: String },

    #[error("Matcher failed on commit {commit}: {reason}")]
    MatcherFailure { commit: String, reason: String },

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Job channel closed")]
    ChannelClosed,

    #[error("Could not read git log: {0}")]
    LogSource(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScanError {
    /// True for errors caused by the log content rather than the environment.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            ScanError::MalformedOffset(_) | ScanError::MalformedLogEntry { .. }
        )
    }
}

/// Result type alias for scanchanges operations.
pub type Result<T> = std::result::Result<T, ScanError>;
