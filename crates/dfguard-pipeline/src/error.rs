//! Pipeline error types.

use thiserror::Error;

use dfguard_media::MediaError;
use dfguard_ml_client::MlError;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Fatal pipeline failures.
///
/// Per-frame encode and inference failures never surface here; they are
/// recorded in the analysis report instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Media payload is empty")]
    EmptyInput,

    #[error("Invalid media payload: {0}")]
    InvalidPayload(String),

    #[error("Failed to decode media: {0}")]
    Decode(String),

    #[error("Media tooling unavailable: {0}")]
    ToolMissing(String),

    #[error("No frames available within the first {seconds_window} seconds")]
    NoFramesAvailable { seconds_window: u32 },

    #[error("No parsable realism score in {attempted} frames ({failed} failed)")]
    NoParsableScore { attempted: usize, failed: usize },

    #[error("Upstream inference failed: {0}")]
    Upstream(#[from] MlError),

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the caller sent something unusable, as opposed to a dependency failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::EmptyInput | PipelineError::InvalidPayload(_))
    }

    /// Stable identifier for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::EmptyInput => "empty_input",
            PipelineError::InvalidPayload(_) => "invalid_payload",
            PipelineError::Decode(_) => "decode",
            PipelineError::ToolMissing(_) => "tool_missing",
            PipelineError::NoFramesAvailable { .. } => "no_frames",
            PipelineError::NoParsableScore { .. } => "no_parsable_score",
            PipelineError::Upstream(_) => "upstream",
            PipelineError::Cancelled => "cancelled",
            PipelineError::Config(_) => "config",
        }
    }
}

impl From<MediaError> for PipelineError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::EmptyInput => PipelineError::EmptyInput,
            MediaError::InvalidPayload(msg) => PipelineError::InvalidPayload(msg),
            err if err.is_missing_tool() => PipelineError::ToolMissing(err.to_string()),
            MediaError::NoFramesAvailable { seconds_window } => {
                PipelineError::NoFramesAvailable { seconds_window }
            }
            MediaError::Cancelled => PipelineError::Cancelled,
            MediaError::DecodeFailed { message, stderr } => match stderr {
                Some(stderr) => PipelineError::Decode(format!("{}: {}", message, last_line(&stderr))),
                None => PipelineError::Decode(message),
            },
            other => PipelineError::Decode(other.to_string()),
        }
    }
}

/// Last non-empty line of FFmpeg stderr, which usually names the problem.
fn last_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
}
