//! ML client error types.

use std::time::Duration;

use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("Upstream returned HTTP {status_code}: {body_preview}")]
    Status { status_code: u16, body_preview: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Invalid response: {cause}")]
    InvalidResponse { body_preview: String, cause: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl MlError {
    /// HTTP status returned by the upstream, if it answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            MlError::Status { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Truncated response body, if one was received.
    pub fn body_preview(&self) -> Option<&str> {
        match self {
            MlError::Status { body_preview, .. } | MlError::InvalidResponse { body_preview, .. } => {
                Some(body_preview)
            }
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            MlError::Timeout(_) | MlError::Network(_) => true,
            MlError::Status { status_code, .. } => *status_code == 429 || *status_code >= 500,
            _ => false,
        }
    }
}
