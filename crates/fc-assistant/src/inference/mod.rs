//! Natural-language intent classification.
//!
//! Converts driver utterances ("Portami a Roma", "Che tempo fa?") into a
//! structured `Intent` with category, parameters and confidence.
//!
//! Two classifiers, reconciled by the `ConfidenceRouter`:
//! - **Pattern matcher** (local): keyword rules, no I/O, always available.
//! - **LLM classifier**: structured JSON classification through an
//!   `LlmBackend` (Ollama), cached and bounded by a timeout.

pub mod classifier;
pub mod mock;
pub mod ollama;
pub mod patterns;
pub mod prompts;
pub mod router;

use async_trait::async_trait;

use crate::error::LlmError;

pub use classifier::LlmClassifier;
pub use ollama::OllamaBackend;
pub use patterns::PatternMatcher;
pub use router::ConfidenceRouter;

/// One completion call to the LLM backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    /// Ask the backend to constrain output to JSON.
    pub json: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Low-temperature JSON request used for classification.
    pub fn structured(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            json: true,
            temperature: 0.1,
            max_tokens: 300,
        }
    }

    /// Free-text request used for conversational replies.
    pub fn conversational(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            json: false,
            temperature: 0.7,
            max_tokens: 256,
        }
    }
}

/// Text completion backend. Best-effort and fallible.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;

    /// Model identity, part of every cache fingerprint.
    fn model(&self) -> &str;
}
