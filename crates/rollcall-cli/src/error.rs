use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] rollcall_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Guest name cannot be empty")]
    EmptyGuestName,
    #[error("Guest not found: {0}")]
    GuestNotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    SyncFailed(String),
    #[error("{0}")]
    ResetFailed(String),
    #[error("Refusing to reset without --yes")]
    ResetNotConfirmed,
    #[error(
        "Remote collection is not configured. Run `rollcall config init --project-id <ID>` or set ROLLCALL_FIRESTORE_PROJECT."
    )]
    RemoteNotConfigured,
}
