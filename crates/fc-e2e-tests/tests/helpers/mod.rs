//! Shared test harness for E2E integration tests.
//!
//! Wraps the server router around a real `AiHandler` so every test goes
//! through HTTP, routing, the tool lifecycle and the tool catalogue.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio::sync::broadcast;
use tower::ServiceExt;

use fc_assistant::config::LlmConfig;
use fc_assistant::{AiHandler, AssistantConfig, LlmBackend, LruResponseCache, OllamaBackend};
use fc_protocol::{AssistantEvent, AssistantReply};
use fc_server::routes::build_router;
use fc_server::state::AppState;
use fc_tools::ToolRegistry;

pub struct TestHarness {
    pub handler: Arc<AiHandler>,
    /// Axum router for HTTP requests via `tower::oneshot`.
    pub router: Router,
    /// Subscribed before the first request, so no event is missed.
    pub events: broadcast::Receiver<AssistantEvent>,
}

impl TestHarness {
    pub fn new(
        config: AssistantConfig,
        registry: ToolRegistry,
        backend: Option<Arc<dyn LlmBackend>>,
    ) -> Self {
        let cache = Arc::new(LruResponseCache::from_config(&config.intent));
        let handler = AiHandler::new(&config, Arc::new(registry), backend, cache);
        let state = AppState::new(handler);
        let events = state.handler.subscribe();
        Self {
            handler: state.handler.clone(),
            router: build_router(state),
            events,
        }
    }

    /// Default catalogue, no LLM: every utterance goes through the patterns.
    pub fn pattern_only() -> Self {
        Self::new(AssistantConfig::default(), ToolRegistry::with_defaults(), None)
    }

    pub fn with_registry(registry: ToolRegistry) -> Self {
        Self::new(AssistantConfig::default(), registry, None)
    }

    /// Default catalogue backed by an Ollama endpoint at `host` (a wiremock server).
    pub fn with_ollama(host: &str, config: AssistantConfig) -> Self {
        let backend = OllamaBackend::new(LlmConfig {
            host: host.to_string(),
            model: "gemma3:270m".into(),
            timeout_secs: 5,
            enabled: true,
        })
        .unwrap();
        Self::new(config, ToolRegistry::with_defaults(), Some(Arc::new(backend)))
    }

    /// POST /api/v1/conversations/{id}/messages.
    pub async fn post_message(&self, conversation: &str, text: &str) -> (StatusCode, serde_json::Value) {
        let body = serde_json::json!({ "text": text });
        let request = Request::post(format!("/api/v1/conversations/{conversation}/messages"))
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        self.send(request).await
    }

    /// Send a message that must succeed and decode its replies.
    pub async fn say(&self, conversation: &str, text: &str) -> Vec<AssistantReply> {
        let (status, json) = self.post_message(conversation, text).await;
        assert_eq!(status, StatusCode::OK, "'{text}' was rejected: {json}");
        serde_json::from_value(json).unwrap()
    }

    /// POST /api/v1/conversations/{id}/cancel.
    pub async fn cancel(&self, conversation: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::post(format!("/api/v1/conversations/{conversation}/cancel"))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// GET /api/v1/conversations/{id}/session.
    pub async fn session(&self, conversation: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::get(format!("/api/v1/conversations/{conversation}/session"))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn put_json(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::put(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        self.send(request).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.send(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Events received so far, in order.
    pub fn drain_events(&mut self) -> Vec<AssistantEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn drain_kinds(&mut self) -> Vec<&'static str> {
        self.drain_events().iter().map(AssistantEvent::kind).collect()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}

/// Ollama `/api/chat` body carrying `content` as the assistant message.
pub fn ollama_reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "model": "gemma3:270m",
        "message": { "role": "assistant", "content": content },
        "done": true
    })
}
