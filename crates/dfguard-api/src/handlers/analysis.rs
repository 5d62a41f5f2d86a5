//! Analysis handlers.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Extension;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use dfguard_models::{AnalysisReport, Classification, FinalVerdict, MediaKind, NewDetectionLog};
use dfguard_pipeline::AnalysisContext;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::middleware::RequestId;
use crate::state::AppState;

/// Query parameters for video analysis.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeVideoQuery {
    /// Original filename, used as a container hint
    pub filename: Option<String>,
    /// Include the per-frame report in the response
    #[serde(default)]
    pub include_report: bool,
}

/// Analysis response.
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub classification: Classification,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AnalysisReport>,
}

impl AnalyzeResponse {
    fn new(verdict: &FinalVerdict) -> Self {
        Self {
            classification: verdict.classification,
            score: verdict.score,
            report: None,
        }
    }
}

fn analysis_context(state: &AppState, request_id: Option<Extension<RequestId>>) -> AnalysisContext {
    let request_id = request_id
        .map(|Extension(id)| id.0)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    AnalysisContext::new(request_id).with_cancel(state.shutdown.clone())
}

async fn persist_verdict(
    state: &AppState,
    kind: MediaKind,
    verdict: &FinalVerdict,
) -> ApiResult<()> {
    let log = NewDetectionLog::from_verdict(kind, verdict, Utc::now());
    let saved = state.logs.save(log).await?;
    tracing::debug!(log_id = saved.id, media_kind = %kind, "Detection log saved");
    Ok(())
}

/// Classify an uploaded video.
pub async fn analyze_video(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    Query(query): Query<AnalyzeVideoQuery>,
    body: Bytes,
) -> ApiResult<Json<AnalyzeResponse>> {
    let ctx = analysis_context(&state, request_id);
    let start = Instant::now();

    let result = state
        .video
        .analyze_payload(body.to_vec(), query.filename.as_deref(), &ctx)
        .await;
    metrics::record_analysis(
        MediaKind::Video,
        result.as_ref().map(|_| ()),
        start.elapsed().as_secs_f64(),
    );
    let analysis = result?;
    metrics::record_frame_errors(&analysis.report);

    persist_verdict(&state, MediaKind::Video, &analysis.verdict).await?;

    let mut response = AnalyzeResponse::new(&analysis.verdict);
    if query.include_report {
        response.report = Some(analysis.report);
    }
    Ok(Json(response))
}

/// Classify an uploaded audio clip.
pub async fn analyze_audio(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    body: Bytes,
) -> ApiResult<Json<AnalyzeResponse>> {
    let Some(audio) = state.audio.as_ref() else {
        return Err(ApiError::unavailable("audio analysis is not configured"));
    };

    let ctx = analysis_context(&state, request_id);
    let start = Instant::now();

    let result = audio.analyze_payload(body.to_vec(), &ctx).await;
    metrics::record_analysis(
        MediaKind::Audio,
        result.as_ref().map(|_| ()),
        start.elapsed().as_secs_f64(),
    );
    let analysis = result?;

    persist_verdict(&state, MediaKind::Audio, &analysis.verdict).await?;

    Ok(Json(AnalyzeResponse::new(&analysis.verdict)))
}
