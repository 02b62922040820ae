//! Explicit cancellation and tool timeouts through the HTTP API.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use fc_assistant::AssistantConfig;
use fc_assistant::config::LifecycleConfig;
use fc_protocol::{AssistantEvent, Category, SessionState, ToolStatus};
use fc_tools::ToolRegistry;
use fc_tools::mock::{MockBehavior, MockTool};

use helpers::TestHarness;

fn hanging_weather() -> ToolRegistry {
    ToolRegistry::new(vec![Arc::new(
        MockTool::new("get_weather", Category::Weather).with_behavior(MockBehavior::Hang),
    )])
}

/// The cancel endpoint ends a session waiting for a parameter.
#[tokio::test]
async fn e2e_cancel_endpoint_during_clarification() {
    let mut h = TestHarness::pattern_only();
    h.say("van-1", "Che tempo fa?").await;
    h.drain_events();

    let (status, json) = h.cancel("van-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tool_result"]["status"], "cancelled");
    assert_eq!(json["state"], "canceled");

    let events = h.drain_events();
    assert!(matches!(
        events.as_slice(),
        [AssistantEvent::ToolCancelled {
            from_state: SessionState::Clarifying,
            ..
        }]
    ));

    let (status, _) = h.cancel("van-1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// Cancelling a running tool aborts it; the in-flight turn reports the outcome.
#[tokio::test(start_paused = true)]
async fn e2e_cancel_running_tool() {
    let h = Arc::new(TestHarness::with_registry(hanging_weather()));

    let turn = {
        let h = h.clone();
        tokio::spawn(async move { h.say("van-1", "Che tempo fa?").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, _) = h.cancel("van-1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let replies = turn.await.unwrap();
    assert_eq!(replies.len(), 1);
    let result = replies[0].tool_result.as_ref().unwrap();
    assert_eq!(result.status, ToolStatus::Cancelled);
    assert_eq!(replies[0].state, Some(SessionState::Canceled));
}

/// A tool that never answers is stopped at the configured timeout.
#[tokio::test(start_paused = true)]
async fn e2e_tool_timeout_reports_error() {
    let config = AssistantConfig {
        lifecycle: LifecycleConfig {
            tool_timeout_secs: 2,
            ..LifecycleConfig::default()
        },
        ..AssistantConfig::default()
    };
    let mut h = TestHarness::new(config, hanging_weather(), None);

    let replies = h.say("van-1", "Che tempo fa?").await;
    let result = replies[0].tool_result.as_ref().unwrap();
    assert_eq!(result.status, ToolStatus::Error);
    assert!(result.error_detail.as_ref().unwrap().contains("timed out"));
    assert_eq!(replies[0].state, Some(SessionState::Error));

    assert_eq!(h.drain_kinds().last(), Some(&"tool_finished"));
}

/// A cancellation phrase sent while the tool runs stops it right away; the
/// running turn carries the only cancelled result.
#[tokio::test(start_paused = true)]
async fn e2e_cancellation_phrase_during_running_tool() {
    let h = Arc::new(TestHarness::with_registry(hanging_weather()));

    let turn = {
        let h = h.clone();
        tokio::spawn(async move { h.say("van-1", "Che tempo fa?").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let replies = h.say("van-1", "annulla").await;
    assert!(replies.is_empty());

    let replies = turn.await.unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(
        replies[0].tool_result.as_ref().unwrap().status,
        ToolStatus::Cancelled
    );

    let mut h = Arc::into_inner(h).unwrap();
    let kinds = h.drain_kinds();
    assert_eq!(kinds.iter().filter(|k| **k == "tool_cancelled").count(), 1);
    assert!(!kinds.contains(&"tool_finished"));
}

/// A failing tool yields an error result and leaves the conversation usable.
#[tokio::test]
async fn e2e_failing_tool_then_recovery() {
    let registry = ToolRegistry::new(vec![
        Arc::new(
            MockTool::new("get_weather", Category::Weather)
                .with_behavior(MockBehavior::Fail("sensor offline".into())),
        ),
        Arc::new(MockTool::new("set_route", Category::Navigation)),
    ]);
    let h = TestHarness::with_registry(registry);

    let replies = h.say("van-1", "Che tempo fa?").await;
    let result = replies[0].tool_result.as_ref().unwrap();
    assert_eq!(result.status, ToolStatus::Error);
    assert!(result.error_detail.as_ref().unwrap().contains("sensor offline"));
    assert!(replies[0].text.contains("Riprova"));

    let next = h.say("van-1", "Portami a Roma").await;
    assert_eq!(
        next[0].tool_result.as_ref().unwrap().status,
        ToolStatus::Completed
    );
}
