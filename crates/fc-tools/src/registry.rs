//! Tool registry indexed by name and by intent category.

use std::collections::HashMap;
use std::sync::Arc;

use fc_protocol::Category;
use serde::Serialize;

use crate::schema::ToolSchema;
use crate::telemetry::{StaticTelemetry, TelemetrySource};
use crate::types::CamperTool;

/// Metadata about a registered tool (used by the tool listing API).
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub category: Category,
    pub schema: serde_json::Value,
}

/// Registry of camper tools, indexed for O(1) dispatch.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn CamperTool>>,
    by_name: HashMap<String, usize>,
    /// First registered tool per category.
    by_category: HashMap<Category, usize>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn CamperTool>>) -> Self {
        let mut by_name = HashMap::new();
        let mut by_category = HashMap::new();
        for (i, tool) in tools.iter().enumerate() {
            by_name.insert(tool.name().to_string(), i);
            if tool.category().is_tool() {
                by_category.entry(tool.category()).or_insert(i);
            }
        }
        Self {
            tools,
            by_name,
            by_category,
        }
    }

    /// Default tools backed by a static telemetry snapshot.
    pub fn with_defaults() -> Self {
        Self::with_telemetry(Arc::new(StaticTelemetry::default()))
    }

    pub fn with_telemetry(telemetry: Arc<dyn TelemetrySource>) -> Self {
        Self::new(crate::tools::all_tools(telemetry))
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn CamperTool>> {
        self.by_name.get(name).map(|&i| self.tools[i].clone())
    }

    /// The tool that serves `category`, if any.
    pub fn for_category(&self, category: Category) -> Option<Arc<dyn CamperTool>> {
        self.by_category.get(&category).map(|&i| self.tools[i].clone())
    }

    pub fn schema_for(&self, category: Category) -> Option<&ToolSchema> {
        self.by_category
            .get(&category)
            .map(|&i| self.tools[i].schema())
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|tool| ToolInfo {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                category: tool.category(),
                schema: tool.schema().to_json_schema(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
