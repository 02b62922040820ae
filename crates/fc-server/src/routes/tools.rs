use axum::Json;
use axum::extract::State;
use fc_tools::ToolInfo;

use crate::state::AppState;

/// GET /api/v1/tools — registered tools with category and parameter schema.
pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolInfo>> {
    Json(state.handler.registry().list_tools())
}
