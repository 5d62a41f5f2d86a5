//! Shared data models for the DFGuard backend.
//!
//! This crate provides Serde-serializable types for:
//! - Frame sampling windows
//! - Per-frame inference results and the analysis report
//! - Final verdicts and their classification policy
//! - Detection log records handed to persistence

pub mod detection_log;
pub mod report;
pub mod sampling;
pub mod verdict;

// Re-export common types
pub use detection_log::{DetectionLog, DetectionLogId, MediaKind, NewDetectionLog};
pub use report::{AnalysisReport, FrameError, FrameStage, PerFrameResult, ReportMetadata};
pub use sampling::{SampleWindow, SampleWindowError, DEFAULT_FRAME_COUNT, DEFAULT_WINDOW_SECONDS};
pub use verdict::{Classification, FinalVerdict, DEFAULT_BONAFIDE_THRESHOLD};
