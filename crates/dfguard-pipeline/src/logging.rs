//! Structured analysis logging.
//!
//! Every analysis run logs its stage transitions with the request id and the
//! media kind attached, so one request can be followed through the logs.

use std::fmt;

use tokio::sync::watch;
use tracing::{info, warn, Span};

use dfguard_models::{AnalysisReport, FinalVerdict, FrameError, MediaKind};

use crate::error::PipelineError;

/// Analysis pipeline states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Decoding,
    Sampling,
    Inferring,
    Aggregating,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Decoding => "decoding",
            PipelineStage::Sampling => "sampling",
            PipelineStage::Inferring => "inferring",
            PipelineStage::Aggregating => "aggregating",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-request inputs that are not part of the media itself.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    request_id: String,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl AnalysisContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            cancel_rx: None,
        }
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn cancel_rx(&self) -> Option<watch::Receiver<bool>> {
        self.cancel_rx.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_rx.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

/// Logger for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisLogger {
    request_id: String,
    media_kind: MediaKind,
}

impl AnalysisLogger {
    pub fn new(request_id: &str, media_kind: MediaKind) -> Self {
        Self {
            request_id: request_id.to_string(),
            media_kind,
        }
    }

    /// Log entry into a non-terminal stage.
    pub fn stage(&self, stage: PipelineStage, message: &str) {
        info!(
            request_id = %self.request_id,
            media_kind = %self.media_kind,
            stage = %stage,
            "{}", message
        );
    }

    /// Log a frame failure that was recorded in the report.
    pub fn frame_error(&self, error: &FrameError) {
        warn!(
            request_id = %self.request_id,
            media_kind = %self.media_kind,
            frame_index = error.frame_index,
            frame_stage = %error.stage,
            status_code = error.status_code,
            "Frame failed: {}", error.message
        );
    }

    /// Log successful completion.
    pub fn done(&self, verdict: &FinalVerdict, report: Option<&AnalysisReport>) {
        let (frames, frame_errors) = report
            .map(|r| (r.per_frame_results.len(), r.errors.len()))
            .unwrap_or((1, 0));
        info!(
            request_id = %self.request_id,
            media_kind = %self.media_kind,
            stage = %PipelineStage::Done,
            classification = %verdict.classification,
            score = verdict.score,
            frames,
            frame_errors,
            "Analysis completed"
        );
    }

    /// Log a fatal failure.
    pub fn failed(&self, error: &PipelineError) {
        warn!(
            request_id = %self.request_id,
            media_kind = %self.media_kind,
            stage = %PipelineStage::Failed,
            error_kind = error.kind(),
            "Analysis failed: {}", error
        );
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Create a tracing span for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "analysis",
            request_id = %self.request_id,
            media_kind = %self.media_kind
        )
    }
}
