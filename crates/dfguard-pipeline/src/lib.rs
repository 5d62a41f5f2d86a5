//! Deepfake analysis pipeline.
//!
//! Wires the media decoder, the reservoir sampler, the frame encoder and the
//! inference client into one request-scoped run:
//!
//! `Received -> Decoding -> Sampling -> Inferring -> Aggregating -> Done | Failed`
//!
//! Per-frame encode and inference failures are collected into the report.
//! Decode failures, an empty sample and the absence of any usable realism
//! score end the run.

pub mod aggregate;
pub mod audio;
pub mod classifier;
pub mod config;
pub mod error;
pub mod labels;
pub mod logging;
pub mod video;

pub use aggregate::{aggregate_verdict, realism_probability, realism_samples, REALISM_LABELS};
pub use audio::{AudioAnalysis, AudioAnalyzer};
pub use classifier::Classifier;
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use labels::{parse_label_scores, LabelScoreMap};
pub use logging::{AnalysisContext, AnalysisLogger, PipelineStage};
pub use video::{AnalysisSettings, VideoAnalysis, VideoAnalyzer};
