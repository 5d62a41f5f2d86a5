//! Analysis report produced by the frame pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage a per-frame failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStage {
    /// PNG/base64 encoding of the sampled frame
    Encode,
    /// Remote classifier call
    Inference,
}

impl FrameStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameStage::Encode => "encode",
            FrameStage::Inference => "inference",
        }
    }
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Successful inference call for one sampled frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerFrameResult {
    /// Zero-based index of the frame in decode order
    pub frame_index: u64,
    /// Playback offset of the frame in milliseconds
    pub timestamp_ms: u64,
    /// Wall-clock duration of the inference call
    pub elapsed_ms: u64,
    /// Raw JSON returned by the classifier
    pub raw_output: serde_json::Value,
}

/// Recorded failure for one sampled frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameError {
    pub frame_index: u64,
    pub stage: FrameStage,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_preview: Option<String>,
}

impl FrameError {
    pub fn encode(frame_index: u64, message: impl Into<String>) -> Self {
        Self {
            frame_index,
            stage: FrameStage::Encode,
            message: message.into(),
            status_code: None,
            body_preview: None,
        }
    }

    pub fn inference(
        frame_index: u64,
        message: impl Into<String>,
        status_code: Option<u16>,
        body_preview: Option<String>,
    ) -> Self {
        Self {
            frame_index,
            stage: FrameStage::Inference,
            message: message.into(),
            status_code,
            body_preview,
        }
    }
}

/// Sampling metadata attached to every report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub seconds_window: u32,
    pub requested_frames: usize,
    pub returned_frames: usize,
}

/// Outcome of the decode, sample and inference stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Sampled frame indices, ascending
    pub sampled_frame_indices: Vec<u64>,
    /// Successful calls, ascending by frame index
    pub per_frame_results: Vec<PerFrameResult>,
    /// Per-frame failures, ascending by frame index
    pub errors: Vec<FrameError>,
    pub metadata: ReportMetadata,
}

impl AnalysisReport {
    /// Whether any sampled frame failed.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_error_omits_empty_fields() {
        let err = FrameError::encode(3, "png failed");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["stage"], "encode");
        assert!(value.get("status_code").is_none());
        assert!(value.get("body_preview").is_none());
    }

    #[test]
    fn test_report_shape() {
        let report = AnalysisReport {
            sampled_frame_indices: vec![1, 4],
            per_frame_results: vec![PerFrameResult {
                frame_index: 1,
                timestamp_ms: 40,
                elapsed_ms: 12,
                raw_output: json!([{"label": "real", "score": 0.9}]),
            }],
            errors: vec![FrameError::inference(4, "upstream 503", Some(503), Some("busy".into()))],
            metadata: ReportMetadata {
                seconds_window: 10,
                requested_frames: 10,
                returned_frames: 2,
            },
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["sampled_frame_indices"], json!([1, 4]));
        assert_eq!(value["errors"][0]["status_code"], 503);
        assert_eq!(value["metadata"]["returned_frames"], 2);
        assert!(report.has_errors());
    }
}
