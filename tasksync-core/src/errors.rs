use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Airtable configuration is missing")]
    MissingConfiguration,

    #[error("Image upload endpoint is not configured")]
    UploadNotConfigured,

    #[error("Invalid delay: {0} days (expected 1, 2, 7 or 14)")]
    InvalidDelay(u32),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
