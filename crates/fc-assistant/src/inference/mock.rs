//! Scripted LLM backend for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{CompletionRequest, LlmBackend};
use crate::error::LlmError;

/// One scripted backend answer.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    /// Fail with a transport error.
    Fail(String),
    /// Sleep, then answer.
    Delayed(Duration, String),
    /// Never answer.
    Hang,
}

impl ScriptedReply {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// A classification answer as the backend would produce it.
    pub fn classification(category: &str, confidence: f64, parameters: serde_json::Value) -> Self {
        Self::Text(
            serde_json::json!({
                "category": category,
                "confidence": confidence,
                "parameters": parameters,
                "secondary_intents": [],
                "reasoning": "scripted",
                "clarification_needed": false
            })
            .to_string(),
        )
    }
}

/// Backend that replays queued answers and records requests.
///
/// When the queue is empty the `fallback` answer (if any) is repeated,
/// otherwise the call fails.
pub struct ScriptedBackend {
    model: String,
    queue: Mutex<VecDeque<ScriptedReply>>,
    fallback: Option<ScriptedReply>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            queue: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_replies(self, replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        self.queue.lock().unwrap().extend(replies);
        self
    }

    /// Answer used once the queue is drained.
    pub fn always(mut self, reply: ScriptedReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.queue.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone());

        match next {
            Some(ScriptedReply::Text(s)) => Ok(s),
            Some(ScriptedReply::Fail(e)) => Err(LlmError::Transport(e)),
            Some(ScriptedReply::Delayed(d, s)) => {
                tokio::time::sleep(d).await;
                Ok(s)
            }
            Some(ScriptedReply::Hang) => std::future::pending().await,
            None => Err(LlmError::Transport("no scripted reply".into())),
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}
