//! Confidence routing against a mocked Ollama endpoint.

mod helpers;

use std::time::Duration;

use axum::http::StatusCode;
use fc_assistant::AssistantConfig;
use fc_assistant::config::IntentConfig;
use fc_protocol::{AssistantEvent, DetectionMethod, ReplyKind, ToolStatus};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use helpers::{TestHarness, ollama_reply};

/// Classification requests ask Ollama for JSON; conversational ones do not.
const JSON_FORMAT: &str = r#""format":"json""#;

fn detection_method(events: &[AssistantEvent]) -> Option<DetectionMethod> {
    events.iter().find_map(|e| match e {
        AssistantEvent::IntentDetected {
            detection_method, ..
        } => Some(*detection_method),
        _ => None,
    })
}

async fn mount_classification(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains(JSON_FORMAT))
        .respond_with(ResponseTemplate::new(200).set_body_json(ollama_reply(content)))
        .mount(server)
        .await;
}

/// High-confidence LLM output is used as-is, including its parameters.
#[tokio::test]
async fn e2e_high_confidence_llm_intent() {
    let server = MockServer::start().await;
    mount_classification(
        &server,
        r#"{"category": "weather", "confidence": 0.92, "parameters": {"location": "Milano"}}"#,
    )
    .await;

    let mut h = TestHarness::with_ollama(&server.uri(), AssistantConfig::default());
    let replies = h.say("van-1", "Com'è il cielo sopra Milano?").await;

    assert_eq!(replies[0].kind, ReplyKind::ToolResult);
    assert!(replies[0].text.starts_with("Meteo per Milano"));
    assert_eq!(detection_method(&h.drain_events()), Some(DetectionMethod::Llm));
}

/// Medium confidence: a disagreeing pattern match decides the category.
#[tokio::test]
async fn e2e_medium_confidence_prefers_pattern_category() {
    let server = MockServer::start().await;
    mount_classification(
        &server,
        r#"{"category": "maintenance", "confidence": 0.6, "parameters": {}}"#,
    )
    .await;

    let mut h = TestHarness::with_ollama(&server.uri(), AssistantConfig::default());
    let replies = h.say("van-1", "Portami a Verona").await;

    assert_eq!(replies[0].tool_name.as_deref(), Some("set_route"));
    let events = h.drain_events();
    assert_eq!(
        detection_method(&events),
        Some(DetectionMethod::LlmPatternCombined)
    );
    let confidence = events.iter().find_map(|e| match e {
        AssistantEvent::IntentDetected { confidence, .. } => Some(*confidence),
        _ => None,
    });
    assert!(confidence.unwrap() < 0.6);
}

/// Low confidence falls back to the pattern matcher.
#[tokio::test]
async fn e2e_low_confidence_falls_back_to_patterns() {
    let server = MockServer::start().await;
    mount_classification(
        &server,
        r#"{"category": "weather", "confidence": 0.2, "parameters": {}}"#,
    )
    .await;

    let mut h = TestHarness::with_ollama(&server.uri(), AssistantConfig::default());
    let replies = h.say("van-1", "Portami a Roma").await;

    assert_eq!(replies[0].tool_name.as_deref(), Some("set_route"));
    assert_eq!(
        detection_method(&h.drain_events()),
        Some(DetectionMethod::Fallback)
    );
}

/// Backend errors never surface to the user: patterns take over.
#[tokio::test]
async fn e2e_backend_error_falls_back_to_patterns() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut h = TestHarness::with_ollama(&server.uri(), AssistantConfig::default());
    let replies = h.say("van-1", "Portami a Roma").await;

    assert_eq!(
        replies[0].tool_result.as_ref().unwrap().status,
        ToolStatus::Completed
    );
    assert_eq!(
        detection_method(&h.drain_events()),
        Some(DetectionMethod::Fallback)
    );
}

/// A classification slower than the deadline is abandoned.
#[tokio::test]
async fn e2e_slow_classification_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(ollama_reply(
                    r#"{"category": "weather", "confidence": 0.95, "parameters": {}}"#,
                ))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = AssistantConfig {
        intent: IntentConfig {
            llm_timeout_secs: 1,
            ..IntentConfig::default()
        },
        ..AssistantConfig::default()
    };
    let mut h = TestHarness::with_ollama(&server.uri(), config);
    let replies = h.say("van-1", "Portami a Roma").await;

    assert_eq!(replies[0].tool_name.as_deref(), Some("set_route"));
    assert_eq!(
        detection_method(&h.drain_events()),
        Some(DetectionMethod::Fallback)
    );
}

/// Identical utterances are classified once and then served from the cache.
#[tokio::test]
async fn e2e_repeated_utterance_hits_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains(JSON_FORMAT))
        .respond_with(ResponseTemplate::new(200).set_body_json(ollama_reply(
            r#"{"category": "weather", "confidence": 0.9, "parameters": {"location": "Parma"}}"#,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let h = TestHarness::with_ollama(&server.uri(), AssistantConfig::default());
    let first = h.say("van-1", "Che tempo fa a Parma?").await;
    let second = h.say("van-2", "Che tempo fa a Parma?").await;

    assert_eq!(first[0].text, second[0].text);
    server.verify().await;
}

/// Small talk is answered by the conversational prompt.
#[tokio::test]
async fn e2e_small_talk_uses_conversational_reply() {
    let server = MockServer::start().await;
    mount_classification(
        &server,
        r#"{"category": null, "confidence": 0.9, "parameters": {}}"#,
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(ollama_reply("Ciao! Sono Frank, pronto a partire.")),
        )
        .mount(&server)
        .await;

    let h = TestHarness::with_ollama(&server.uri(), AssistantConfig::default());
    let replies = h.say("van-1", "Ciao Frank!").await;

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].kind, ReplyKind::Conversational);
    assert_eq!(replies[0].text, "Ciao! Sono Frank, pronto a partire.");
}

/// Status, cache clearing and the classification switch over HTTP.
#[tokio::test]
async fn e2e_status_and_runtime_controls() {
    let server = MockServer::start().await;
    mount_classification(
        &server,
        r#"{"category": "weather", "confidence": 0.92, "parameters": {"location": "Milano"}}"#,
    )
    .await;
    let mut h = TestHarness::with_ollama(&server.uri(), AssistantConfig::default());

    let (status, json) = h.get("/api/v1/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["llm_available"], true);
    assert_eq!(json["classification_enabled"], true);
    assert_eq!(json["model"], "gemma3:270m");

    h.say("van-1", "Com'è il cielo sopra Milano?").await;
    let (_, json) = h.get("/api/v1/status").await;
    assert_eq!(json["cache"]["entries"], 1);
    assert_eq!(json["conversations"], 1);

    let (status, _) = h.delete("/api/v1/cache").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, json) = h.get("/api/v1/status").await;
    assert_eq!(json["cache"]["entries"], 0);

    let (status, json) = h
        .put_json("/api/v1/status/classification", serde_json::json!({"enabled": false}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["classification_enabled"], false);

    h.drain_events();
    let replies = h.say("van-2", "Portami a Roma").await;
    assert_eq!(replies[0].tool_name.as_deref(), Some("set_route"));
    assert_eq!(detection_method(&h.drain_events()), Some(DetectionMethod::Pattern));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
