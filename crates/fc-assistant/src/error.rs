//! Error types for configuration, LLM calls and the session state machine.

use fc_protocol::SessionState;
use thiserror::Error;

/// Configuration could not be loaded or is outside safe ranges.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field} = {value} is outside the allowed range {range}")]
    OutOfRange {
        field: &'static str,
        value: String,
        range: &'static str,
    },

    #[error("confidence_threshold_high ({high}) must be greater than confidence_threshold_low ({low})")]
    ThresholdOrder { high: f64, low: f64 },
}

/// Failures talking to, or interpreting, the LLM backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Transport(String),

    #[error("LLM returned HTTP {0}")]
    Status(u16),

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("LLM call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("malformed LLM output: {0}")]
    Malformed(String),

    #[error("LLM returned unknown category: {0}")]
    UnknownCategory(String),
}

/// Tool session state machine violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("invalid session transition {from} -> {to}")]
    InvalidTransition { from: SessionState, to: SessionState },
}
