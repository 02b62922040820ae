//! API route definitions and router builder.

pub mod conversations;
pub mod health;
pub mod status;
pub mod tools;
pub mod ws;

use axum::Router;
use axum::routing::{delete, get, post, put};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/tools", get(tools::list_tools))
        .route("/status", get(status::get_status))
        .route("/status/classification", put(status::set_classification))
        .route("/cache", delete(status::clear_cache))
        .route(
            "/conversations/{id}/messages",
            post(conversations::send_message),
        )
        .route("/conversations/{id}/cancel", post(conversations::cancel))
        .route("/conversations/{id}/session", get(conversations::get_session))
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}
