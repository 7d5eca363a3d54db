//! Error types for the testit grading harness.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for grading operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error while reading submissions or writing results.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required file or setting is missing or unreadable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Submission metadata could not be read or parsed.
    #[error("failed to read submission metadata at {path}: {reason}")]
    Metadata { path: PathBuf, reason: String },

    /// Failed to start or manage a server under test.
    #[error("server error: {0}")]
    Server(String),

    /// The grading service could not be reached.
    #[error("grading service request failed: {0}")]
    Service(String),

    /// The grading service answered, but not with the expected payload.
    #[error("malformed grading service response: {0}")]
    MalformedResponse(String),
}

/// Result type alias for grading operations.
pub type Result<T> = std::result::Result<T, Error>;
