//! Runtime status and controls.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use fc_protocol::{AssistantStatus, ClassificationToggle};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/v1/status — routing configuration, cache and load.
pub async fn get_status(State(state): State<AppState>) -> Json<AssistantStatus> {
    Json(state.handler.status())
}

/// PUT /api/v1/status/classification — switch LLM classification on or off.
pub async fn set_classification(
    State(state): State<AppState>,
    Json(req): Json<ClassificationToggle>,
) -> ApiResult<Json<AssistantStatus>> {
    let active = state.handler.set_classification_enabled(req.enabled);
    if req.enabled && !active {
        return Err(ApiError::BadRequest(
            "no LLM backend is configured".to_string(),
        ));
    }
    Ok(Json(state.handler.status()))
}

/// DELETE /api/v1/cache — drop cached classifications, replies and questions.
pub async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.handler.clear_cache();
    StatusCode::NO_CONTENT
}
