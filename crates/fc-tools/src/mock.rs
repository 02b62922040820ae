//! Mock tool for testing.
//!
//! Scripted outcome plus call recording, so lifecycle and orchestration
//! tests can exercise success, failure and slow tools deterministically.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fc_protocol::{Category, Parameters};

use crate::error::{ToolError, ToolExecResult};
use crate::schema::ToolSchema;
use crate::types::{CamperTool, ToolOutput};

/// What the mock does when executed.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Succeed(ToolOutput),
    Fail(String),
    /// Sleep, then succeed.
    Delay(Duration, ToolOutput),
    /// Never complete.
    Hang,
}

/// Tool with a scripted outcome that records every invocation.
pub struct MockTool {
    name: String,
    category: Category,
    schema: ToolSchema,
    behavior: MockBehavior,
    calls: Mutex<Vec<Parameters>>,
}

impl MockTool {
    /// A tool with no parameters that succeeds immediately.
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        let name = name.into();
        let output = ToolOutput::new(serde_json::json!({ "tool": name }), format!("{name} ok"));
        Self {
            name,
            category,
            schema: ToolSchema::default(),
            behavior: MockBehavior::Succeed(output),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_schema(mut self, schema: ToolSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Parameters of every call so far.
    pub fn calls(&self) -> Vec<Parameters> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CamperTool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Mock tool"
    }

    fn category(&self) -> Category {
        self.category
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, params: &Parameters) -> ToolExecResult<ToolOutput> {
        self.calls.lock().unwrap().push(params.clone());
        match &self.behavior {
            MockBehavior::Succeed(out) => Ok(out.clone()),
            MockBehavior::Fail(msg) => Err(ToolError::Other(msg.clone())),
            MockBehavior::Delay(delay, out) => {
                tokio::time::sleep(*delay).await;
                Ok(out.clone())
            }
            MockBehavior::Hang => {
                std::future::pending::<()>().await;
                Err(ToolError::Other("unreachable".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls() {
        let tool = MockTool::new("gauge", Category::Weather);
        let mut p = Parameters::new();
        p.insert("location".into(), serde_json::json!("Lecce"));
        let out = tool.execute(&p).await.unwrap();
        assert_eq!(out.summary, "gauge ok");
        assert_eq!(tool.call_count(), 1);
        assert_eq!(tool.calls()[0]["location"], "Lecce");
    }

    #[tokio::test]
    async fn scripted_failure() {
        let tool = MockTool::new("broken", Category::Maintenance)
            .with_behavior(MockBehavior::Fail("backend down".into()));
        let err = tool.execute(&Parameters::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "backend down");
    }
}
