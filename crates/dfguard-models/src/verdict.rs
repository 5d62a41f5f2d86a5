//! Final classification verdict.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default realism threshold on the 0..100 score scale.
///
/// Scores at or above this value are classified as bona fide.
pub const DEFAULT_BONAFIDE_THRESHOLD: f64 = 10.0;

/// Outcome of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Bonafide,
    Deepfake,
}

impl Classification {
    /// Classify a 0..100 realism score against `threshold`.
    pub fn from_score(score: f64, threshold: f64) -> Self {
        if score >= threshold {
            Classification::Bonafide
        } else {
            Classification::Deepfake
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Bonafide => "Bonafide",
            Classification::Deepfake => "Deepfake",
        }
    }

    pub fn is_deepfake(&self) -> bool {
        matches!(self, Classification::Deepfake)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bonafide" | "bona fide" => Ok(Classification::Bonafide),
            "deepfake" => Ok(Classification::Deepfake),
            other => Err(format!("unknown classification: {}", other)),
        }
    }
}

/// Verdict returned to the caller and persisted to the detection log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalVerdict {
    pub classification: Classification,
    /// Mean realism probability scaled to 0..100.
    pub score: f64,
}

impl FinalVerdict {
    /// Build a verdict from a 0..100 score.
    pub fn from_score(score: f64, threshold: f64) -> Self {
        let score = score.clamp(0.0, 100.0);
        Self {
            classification: Classification::from_score(score, threshold),
            score,
        }
    }
}
