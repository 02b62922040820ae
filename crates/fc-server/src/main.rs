//! Frank Camper server — HTTP/WebSocket front end for the assistant.

use fc_assistant::{AiHandler, AssistantConfig};
use fc_server::config::ServerConfig;
use fc_server::routes;
use fc_server::state::AppState;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fc-server starting");

    let config = ServerConfig::from_env().with_args(std::env::args().skip(1));

    let assistant = match &config.assistant_config {
        Some(path) => {
            tracing::info!(path = %path, "loading assistant config");
            AssistantConfig::from_file(path)?
        }
        None => {
            tracing::warn!("no config file given, using built-in defaults");
            AssistantConfig::default()
        }
    };
    tracing::info!(
        llm_enabled = assistant.llm.enabled,
        model = %assistant.llm.model,
        host = %assistant.llm.host,
        "assistant configured"
    );

    let state = AppState::new(AiHandler::from_config(&assistant)?);
    let app = routes::build_router(state);

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
