//! Ollama HTTP backend (`/api/chat`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, LlmBackend};
use crate::config::LlmConfig;
use crate::error::LlmError;

/// Ollama chat API request body.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    stream: bool,
    options: ChatOptions,
}

/// A single message in the chat request.
#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama chat API response (only fields we need).
#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Client for a local Ollama endpoint.
pub struct OllamaBackend {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OllamaBackend {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.config.host.trim_end_matches('/'));

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            format: request.json.then_some("json"),
            stream: false,
            options: ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        timeout_ms: self.config.timeout_secs * 1000,
                    }
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(LlmError::Status(response.status().as_u16()));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(format!("response body: {e}")))?;

        match chat.message {
            Some(m) if !m.content.trim().is_empty() => Ok(m.content),
            _ => Err(LlmError::EmptyResponse),
        }
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
