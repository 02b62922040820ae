//! Frank Camper assistant core.
//!
//! Turns a driver's utterance into either a conversational reply or a tool
//! invocation:
//!
//! - [`inference`]: pattern matcher, LLM classifier and the confidence router
//!   that reconciles them.
//! - [`extractor`]: tool parameters from the utterance, the LLM output and
//!   the previous turn.
//! - [`lifecycle`]: per-session state machine with clarification, gating,
//!   timeouts and cancellation.
//! - [`questions`]: clarification questions, optionally phrased by the LLM.
//! - [`handler`]: the per-message orchestrator used by the transport, with
//!   runtime status and controls.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod extractor;
pub mod handler;
pub mod inference;
pub mod lifecycle;
pub mod questions;
pub mod responder;
pub mod session;

pub use cache::{CachedValue, Fingerprint, LruResponseCache, ResponseCache};
pub use config::AssistantConfig;
pub use error::{ConfigError, LifecycleError, LlmError};
pub use handler::{AiHandler, validate};
pub use inference::{ConfidenceRouter, LlmBackend, LlmClassifier, OllamaBackend, PatternMatcher};
pub use lifecycle::ToolLifecycleManager;
pub use questions::QuestionWriter;
pub use session::{CancelHandle, ToolSession};
