//! Detection log handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use dfguard_models::{Classification, DetectionLog, DetectionLogId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Query for filtering logs by classification.
#[derive(Debug, Deserialize)]
pub struct ClassificationQuery {
    pub classification: String,
}

/// List all detection logs.
pub async fn list_logs(State(state): State<AppState>) -> ApiResult<Json<Vec<DetectionLog>>> {
    Ok(Json(state.logs.list().await?))
}

/// List detection logs with one classification.
pub async fn list_logs_by_classification(
    State(state): State<AppState>,
    Query(query): Query<ClassificationQuery>,
) -> ApiResult<Json<Vec<DetectionLog>>> {
    let classification: Classification = query
        .classification
        .parse()
        .map_err(ApiError::bad_request)?;
    Ok(Json(state.logs.list_by_classification(classification).await?))
}

/// Get one detection log.
pub async fn get_log(
    State(state): State<AppState>,
    Path(id): Path<DetectionLogId>,
) -> ApiResult<Json<DetectionLog>> {
    Ok(Json(state.logs.get(id).await?))
}

/// Delete one detection log.
pub async fn delete_log(
    State(state): State<AppState>,
    Path(id): Path<DetectionLogId>,
) -> ApiResult<StatusCode> {
    state.logs.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
