//! Conversation endpoints: one turn per request, explicit cancel and
//! session inspection.

use axum::Json;
use axum::extract::{Path, State};
use fc_protocol::{AssistantReply, SessionSnapshot};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

/// POST /api/v1/conversations/{id}/messages — run one turn.
pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Json<Vec<AssistantReply>>> {
    fc_assistant::validate(&req.text).map_err(|reason| ApiError::BadRequest(reason.into()))?;

    let replies = state
        .handler
        .handle_message(&conversation_id, &req.text)
        .await;
    tracing::info!(
        conversation_id = %conversation_id,
        replies = replies.len(),
        "turn handled"
    );
    Ok(Json(replies))
}

/// POST /api/v1/conversations/{id}/cancel — abandon the active session.
pub async fn cancel(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> ApiResult<Json<AssistantReply>> {
    state
        .handler
        .cancel(&conversation_id)
        .await
        .map(Json)
        .ok_or_else(|| no_session(&conversation_id))
}

/// GET /api/v1/conversations/{id}/session — snapshot of the active session.
pub async fn get_session(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> ApiResult<Json<SessionSnapshot>> {
    state
        .handler
        .session_snapshot(&conversation_id)
        .await
        .map(Json)
        .ok_or_else(|| no_session(&conversation_id))
}

fn no_session(conversation_id: &str) -> ApiError {
    ApiError::NotFound(format!(
        "no active session for conversation '{conversation_id}'"
    ))
}
