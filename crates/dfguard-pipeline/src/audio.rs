//! Audio clip analysis.
//!
//! The whole clip goes to the audio classifier as one base64 payload. Its
//! response is normalized like a frame response and yields a single realism
//! sample, so a failed call is fatal here.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;

use dfguard_media::MediaBlob;
use dfguard_ml_client::{InferenceClient, MlError};
use dfguard_models::{FinalVerdict, MediaKind};

use crate::aggregate::realism_samples;
use crate::classifier::Classifier;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::{AnalysisContext, AnalysisLogger, PipelineStage};

/// Successful audio analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AudioAnalysis {
    pub verdict: FinalVerdict,
    /// Raw classifier response
    pub raw_output: Value,
}

/// Classifies uploaded audio clips.
#[derive(Clone)]
pub struct AudioAnalyzer {
    classifier: Arc<dyn Classifier>,
    bonafide_threshold: f64,
}

impl AudioAnalyzer {
    pub fn new(classifier: Arc<dyn Classifier>, bonafide_threshold: f64) -> Self {
        Self {
            classifier,
            bonafide_threshold,
        }
    }

    /// Build an analyzer for the configured audio endpoint, if there is one.
    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Option<Self>> {
        let Some(client_config) = config.audio_client_config() else {
            return Ok(None);
        };
        let client =
            InferenceClient::new(client_config).map_err(|e| PipelineError::config(e.to_string()))?;
        Ok(Some(Self::new(Arc::new(client), config.bonafide_threshold)))
    }

    /// Normalize an uploaded payload and analyze it.
    pub async fn analyze_payload(
        &self,
        payload: Vec<u8>,
        ctx: &AnalysisContext,
    ) -> PipelineResult<AudioAnalysis> {
        let logger = AnalysisLogger::new(ctx.request_id(), MediaKind::Audio);
        let blob = match MediaBlob::from_payload(payload) {
            Ok(blob) => blob,
            Err(e) => {
                let err = PipelineError::from(e);
                logger.failed(&err);
                return Err(err);
            }
        };

        let result = self
            .run(&blob, ctx, &logger)
            .instrument(logger.create_span())
            .await;

        if let Err(e) = &result {
            logger.failed(e);
        }
        result
    }

    async fn run(
        &self,
        blob: &MediaBlob,
        ctx: &AnalysisContext,
        logger: &AnalysisLogger,
    ) -> PipelineResult<AudioAnalysis> {
        logger.stage(
            PipelineStage::Received,
            &format!("Received {} byte audio clip", blob.len()),
        );
        if blob.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        logger.stage(PipelineStage::Inferring, "Classifying audio clip");
        let raw_output = match self.classifier.classify(&blob.to_base64(), ctx.cancel_rx()).await {
            Ok(raw) => raw,
            Err(MlError::Cancelled) => return Err(PipelineError::Cancelled),
            Err(e) => return Err(PipelineError::Upstream(e)),
        };

        logger.stage(PipelineStage::Aggregating, "Extracting realism score");
        let score = realism_samples([&raw_output], 1)
            .first()
            .copied()
            .ok_or(PipelineError::NoParsableScore {
                attempted: 1,
                failed: 0,
            })?;

        let verdict = FinalVerdict::from_score(score * 100.0, self.bonafide_threshold);
        logger.done(&verdict, None);
        Ok(AudioAnalysis {
            verdict,
            raw_output,
        })
    }
}
