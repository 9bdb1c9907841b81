//! Error types for rollcall-core

use thiserror::Error;

/// Result type alias using rollcall-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in rollcall-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// A required field was blank; rejected before any I/O
    #[error("Validation error: {0}")]
    Validation(String),

    /// Add of an id that already exists locally
    #[error("Guest already exists: {0}")]
    Conflict(String),

    /// Network or service failure during a remote call
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// A remote batch was rejected and is treated as not applied
    #[error("Batch commit failed: {0}")]
    BatchCommitFailed(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input (configuration, import rows, documents)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Self::RemoteUnavailable(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(
            Error::Conflict("alice".into()).to_string(),
            "Guest already exists: alice"
        );
    }
}
