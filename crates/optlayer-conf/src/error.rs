//! Error types for optlayer-conf

use std::path::PathBuf;

/// Result type for optlayer-conf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in optlayer-conf operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },

    #[error("Invalid value for {key}: '{value}' is not a valid {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid profile pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
