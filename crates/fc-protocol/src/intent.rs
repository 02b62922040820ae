use serde::{Deserialize, Serialize};

/// Parameter map passed to tools: parameter name → JSON value.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Closed set of intent categories the assistant can dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Navigation,
    Weather,
    VehicleStatus,
    Maintenance,
    /// No tool intent: the utterance is conversational.
    #[default]
    None,
}

impl Category {
    /// Categories that map to a tool, in tie-break order.
    pub const TOOL_CATEGORIES: [Category; 4] = [
        Category::Navigation,
        Category::Weather,
        Category::VehicleStatus,
        Category::Maintenance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::Weather => "weather",
            Self::VehicleStatus => "vehicle_status",
            Self::Maintenance => "maintenance",
            Self::None => "none",
        }
    }

    /// Lenient parse used for LLM output. Accepts the canonical names plus
    /// a few aliases models tend to produce.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "navigation" | "route" | "navigazione" => Some(Self::Navigation),
            "weather" | "meteo" => Some(Self::Weather),
            "vehicle_status" | "vehicle" | "veicolo" => Some(Self::VehicleStatus),
            "maintenance" | "manutenzione" => Some(Self::Maintenance),
            "none" | "null" | "" | "conversation" | "general" => Some(Self::None),
            _ => None,
        }
    }

    pub fn is_tool(self) -> bool {
        self != Self::None
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which classification path produced an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Pattern matcher only (LLM classification disabled).
    Pattern,
    /// LLM result used verbatim (high confidence).
    Llm,
    /// LLM result reconciled with the pattern matcher (medium confidence).
    LlmPatternCombined,
    /// Pattern matcher used because the LLM failed or was not confident.
    Fallback,
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pattern => "pattern",
            Self::Llm => "llm",
            Self::LlmPatternCombined => "llm_pattern_combined",
            Self::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// Structured outcome of classifying an utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub category: Category,
    /// Always within `0.0..=1.0`.
    pub confidence: f64,
    #[serde(default)]
    pub parameters: Parameters,
    pub detection_method: DetectionMethod,
    /// Further tool intents found in the same utterance, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_intents: Vec<Intent>,
}

impl Intent {
    pub fn new(category: Category, confidence: f64, detection_method: DetectionMethod) -> Self {
        Self {
            category,
            confidence: clamp_confidence(confidence),
            parameters: Parameters::new(),
            detection_method,
            secondary_intents: Vec::new(),
        }
    }

    /// An intent with no tool category.
    pub fn none(detection_method: DetectionMethod) -> Self {
        Self::new(Category::None, 0.0, detection_method)
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    pub fn with_method(mut self, detection_method: DetectionMethod) -> Self {
        self.detection_method = detection_method;
        self
    }

    pub fn is_actionable(&self) -> bool {
        self.category.is_tool()
    }
}

/// Clamp to `[0, 1]`, mapping NaN to zero.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
