use tasksync_core::SyncError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote service returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Offline: remote writes are unavailable")]
    Offline,

    #[error("Remote service did not return a record id")]
    CreateRejected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to acquire lock: {0}")]
    LockError(String),
}

impl ClientError {
    /// Errors that a retry or a change of settings can clear, as opposed to a
    /// local bug or a corrupt store.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Http(_) | ClientError::Remote { .. } | ClientError::Offline
        )
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
