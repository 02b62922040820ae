//! Shared application state for the Axum server.

use std::sync::Arc;

use fc_assistant::{AiHandler, AssistantConfig, LruResponseCache};
use fc_tools::ToolRegistry;

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<AiHandler>,
}

impl AppState {
    pub fn new(handler: AiHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Default tools with pattern-only routing and no LLM backend.
    /// Used by tests and when Ollama is switched off.
    pub fn offline() -> Self {
        let config = AssistantConfig::default();
        let cache = Arc::new(LruResponseCache::from_config(&config.intent));
        Self::new(AiHandler::new(
            &config,
            Arc::new(ToolRegistry::with_defaults()),
            None,
            cache,
        ))
    }
}
