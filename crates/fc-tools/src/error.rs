//! Tool execution error types.

use thiserror::Error;

/// Errors a tool can raise while executing.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("telemetry unavailable: {0}")]
    Telemetry(String),

    #[error("{0}")]
    Other(String),
}

/// Convenience alias for tool results.
pub type ToolExecResult<T> = Result<T, ToolError>;
