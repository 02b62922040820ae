//! Tool output type and the `CamperTool` trait.

use async_trait::async_trait;
use fc_protocol::{Category, Parameters};
use serde::{Deserialize, Serialize};

use crate::error::ToolExecResult;
use crate::schema::ToolSchema;

/// Successful output of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Structured result data (JSON).
    pub data: serde_json::Value,
    /// Human-readable summary shown to the user.
    pub summary: String,
}

impl ToolOutput {
    pub fn new(data: serde_json::Value, summary: impl Into<String>) -> Self {
        Self {
            data,
            summary: summary.into(),
        }
    }
}

/// Trait for tools the assistant can dispatch to.
#[async_trait]
pub trait CamperTool: Send + Sync {
    /// Tool name (e.g., "set_route").
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Intent category this tool serves.
    fn category(&self) -> Category;

    /// Declared parameters.
    fn schema(&self) -> &ToolSchema;

    /// Execute with parameters already validated against `schema()` and with
    /// defaults applied.
    async fn execute(&self, params: &Parameters) -> ToolExecResult<ToolOutput>;
}
