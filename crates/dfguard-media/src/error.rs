//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while decoding, sampling or encoding frames.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media payload is empty")]
    EmptyInput,

    #[error("Invalid media payload: {0}")]
    InvalidPayload(String),

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("Failed to decode media: {message}")]
    DecodeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("No frames decoded within the first {seconds_window} seconds")]
    NoFramesAvailable { seconds_window: u32 },

    #[error("Failed to encode frame {frame_index}: {message}")]
    EncodeFailed { frame_index: u64, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create a decode failure error.
    pub fn decode_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
            stderr,
        }
    }

    /// Create a per-frame encode failure error.
    pub fn encode_failed(frame_index: u64, message: impl Into<String>) -> Self {
        Self::EncodeFailed {
            frame_index,
            message: message.into(),
        }
    }

    /// Whether a required FFmpeg binary is missing from the host.
    pub fn is_missing_tool(&self) -> bool {
        matches!(self, MediaError::FfmpegNotFound | MediaError::FfprobeNotFound)
    }

    /// Whether this error only affects a single frame.
    pub fn is_per_frame(&self) -> bool {
        matches!(self, MediaError::EncodeFailed { .. })
    }
}
