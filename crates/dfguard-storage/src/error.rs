//! Storage error types.

use thiserror::Error;

use dfguard_models::DetectionLogId;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during log storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Detection log not found: {0}")]
    NotFound(DetectionLogId),

    #[error("Corrupt log file: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}
