//! Clarification questions for missing tool parameters.
//!
//! Every parameter has a fixed question in its schema. When an LLM writer is
//! configured, the model may phrase the question instead; a failed, late or
//! unusable answer falls back to the fixed text.

use std::sync::Arc;
use std::time::Duration;

use fc_protocol::Parameters;
use fc_tools::{CamperTool, ToolSchema};
use serde_json::json;

use crate::cache::{CachedValue, Fingerprint, ResponseCache};
use crate::error::LlmError;
use crate::inference::prompts::{QUESTION_PROMPT, question_message};
use crate::inference::{CompletionRequest, LlmBackend};

/// Longest generated question accepted, in characters.
const MAX_QUESTION_CHARS: usize = 200;

struct LlmWriter {
    backend: Arc<dyn LlmBackend>,
    cache: Arc<dyn ResponseCache>,
    timeout: Duration,
}

/// Produces the question asked for a missing parameter.
#[derive(Default)]
pub struct QuestionWriter {
    llm: Option<LlmWriter>,
}

impl QuestionWriter {
    /// Schema questions only.
    pub fn fixed() -> Self {
        Self::default()
    }

    /// Ask `backend` first, bounded by `timeout`. Accepted questions are
    /// cached per tool, parameter and already collected values.
    pub fn with_llm(
        backend: Arc<dyn LlmBackend>,
        cache: Arc<dyn ResponseCache>,
        timeout: Duration,
    ) -> Self {
        Self {
            llm: Some(LlmWriter {
                backend,
                cache,
                timeout,
            }),
        }
    }

    pub async fn question(
        &self,
        tool: &dyn CamperTool,
        parameter: &str,
        collected: &Parameters,
    ) -> String {
        let Some(llm) = &self.llm else {
            return fixed_question(tool.schema(), parameter);
        };
        match llm.generate(tool, parameter, collected).await {
            Ok(question) => question,
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    tool = tool.name(),
                    parameter,
                    "using fixed clarification question"
                );
                fixed_question(tool.schema(), parameter)
            }
        }
    }
}

impl LlmWriter {
    async fn generate(
        &self,
        tool: &dyn CamperTool,
        parameter: &str,
        collected: &Parameters,
    ) -> Result<String, LlmError> {
        let context = json!({ "tool": tool.name(), "collected": collected });
        let key = Fingerprint::derive(parameter, &context, self.backend.model());
        if let Some(CachedValue::Reply(question)) = self.cache.get(&key) {
            return Ok(question);
        }

        let description = tool
            .schema()
            .param(parameter)
            .map(|p| p.description)
            .unwrap_or_default();
        let request = CompletionRequest::conversational(
            QUESTION_PROMPT,
            question_message(tool.name(), tool.description(), parameter, description, collected),
        );
        let content = match tokio::time::timeout(self.timeout, self.backend.complete(&request)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(LlmError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
        };

        let question = parse_question(&content)?;
        self.cache.put(key, CachedValue::Reply(question.clone()));
        Ok(question)
    }
}

/// The schema's question for `parameter`, or a generic one.
pub fn fixed_question(schema: &ToolSchema, parameter: &str) -> String {
    schema
        .param(parameter)
        .map(|p| p.question())
        .unwrap_or_else(|| format!("Puoi fornire: {parameter}?"))
}

/// Accept a single short question, either as plain text or as
/// `{"question": ...}` / `{"questions": [...]}` JSON.
fn parse_question(content: &str) -> Result<String, LlmError> {
    let trimmed = content.trim();
    let text = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => value
            .get("question")
            .or_else(|| value.get("questions").and_then(|q| q.get(0)))
            .or_else(|| value.get(0))
            .and_then(|q| q.as_str())
            .map(str::to_string)
            .ok_or_else(|| LlmError::Malformed("no question in JSON reply".into()))?,
        Err(_) => trimmed.to_string(),
    };

    let question = text.trim().trim_matches(|c: char| c == '"' || c == '«' || c == '»').trim();
    if question.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    if question.contains('\n') {
        return Err(LlmError::Malformed("question spans several lines".into()));
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(LlmError::Malformed("question too long".into()));
    }
    if !question.ends_with('?') {
        return Err(LlmError::Malformed("reply is not a question".into()));
    }
    Ok(question.to_string())
}
