use serde::{Deserialize, Serialize};

/// Point-in-time view of the assistant's runtime configuration and load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantStatus {
    /// An LLM backend is configured.
    pub llm_available: bool,
    /// The LLM classifier currently participates in routing.
    pub classification_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub confidence_threshold_high: f64,
    pub confidence_threshold_low: f64,
    pub llm_timeout_ms: u64,
    pub cache: CacheStats,
    /// Conversations held in memory.
    pub conversations: usize,
    pub tools: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
}

/// Body of a runtime classification toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationToggle {
    pub enabled: bool,
}
