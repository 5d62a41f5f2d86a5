//! Frame sampling window.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of seconds scanned from the start of a video.
pub const DEFAULT_WINDOW_SECONDS: u32 = 10;

/// Default number of frames kept in the sample.
pub const DEFAULT_FRAME_COUNT: usize = 10;

/// Invalid sampling window bounds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleWindowError {
    #[error("max_seconds must be at least 1")]
    ZeroSeconds,

    #[error("max_frames must be at least 1")]
    ZeroFrames,
}

/// Bounds on how much of a video is scanned and how many frames are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSampleWindow")]
pub struct SampleWindow {
    max_seconds: u32,
    max_frames: usize,
}

/// Unchecked wire form of [`SampleWindow`].
#[derive(Deserialize)]
struct RawSampleWindow {
    max_seconds: u32,
    max_frames: usize,
}

impl TryFrom<RawSampleWindow> for SampleWindow {
    type Error = SampleWindowError;

    fn try_from(raw: RawSampleWindow) -> Result<Self, Self::Error> {
        Self::new(raw.max_seconds, raw.max_frames)
    }
}

impl SampleWindow {
    /// Create a window, rejecting zero bounds.
    pub fn new(max_seconds: u32, max_frames: usize) -> Result<Self, SampleWindowError> {
        if max_seconds == 0 {
            return Err(SampleWindowError::ZeroSeconds);
        }
        if max_frames == 0 {
            return Err(SampleWindowError::ZeroFrames);
        }
        Ok(Self {
            max_seconds,
            max_frames,
        })
    }

    /// Seconds of playback eligible for sampling.
    pub fn max_seconds(&self) -> u32 {
        self.max_seconds
    }

    /// Maximum number of frames retained.
    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// First playback offset (ms) that falls outside the window.
    pub fn cutoff_ms(&self) -> u64 {
        u64::from(self.max_seconds) * 1000
    }

    /// Whether a frame at `timestamp_ms` is eligible for sampling.
    pub fn contains(&self, timestamp_ms: u64) -> bool {
        timestamp_ms < self.cutoff_ms()
    }
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self {
            max_seconds: DEFAULT_WINDOW_SECONDS,
            max_frames: DEFAULT_FRAME_COUNT,
        }
    }
}
