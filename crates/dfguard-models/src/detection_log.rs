//! Detection log records.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::verdict::{Classification, FinalVerdict};

/// Identifier assigned by the log store.
pub type DetectionLogId = u64;

/// Kind of media that was analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Log entry to be persisted, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDetectionLog {
    pub media_kind: MediaKind,
    pub classification: Classification,
    pub score: f64,
    pub date: NaiveDate,
    pub hour: NaiveTime,
    #[serde(rename = "isDeepFake")]
    pub is_deepfake: bool,
}

impl NewDetectionLog {
    /// Build a log entry for a verdict reached at `at`.
    pub fn from_verdict(media_kind: MediaKind, verdict: &FinalVerdict, at: DateTime<Utc>) -> Self {
        Self {
            media_kind,
            classification: verdict.classification,
            score: verdict.score,
            date: at.date_naive(),
            hour: at.time(),
            is_deepfake: verdict.classification.is_deepfake(),
        }
    }

    /// Attach a store-assigned id.
    pub fn with_id(self, id: DetectionLogId) -> DetectionLog {
        DetectionLog {
            id,
            media_kind: self.media_kind,
            classification: self.classification,
            score: self.score,
            date: self.date,
            hour: self.hour,
            is_deepfake: self.is_deepfake,
        }
    }
}

/// Persisted detection log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionLog {
    pub id: DetectionLogId,
    pub media_kind: MediaKind,
    pub classification: Classification,
    pub score: f64,
    pub date: NaiveDate,
    pub hour: NaiveTime,
    #[serde(rename = "isDeepFake")]
    pub is_deepfake: bool,
}
