//! Assistant configuration, loadable from TOML.
//!
//! Every section is optional and falls back to defaults. `from_file` and
//! `from_toml_str` validate the result; out-of-range values are rejected,
//! never clamped.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level configuration for the assistant core.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssistantConfig {
    /// Intent classification and caching.
    #[serde(default)]
    pub intent: IntentConfig,
    /// Tool session behaviour.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// LLM backend (Ollama) connection.
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Confidence routing, LLM classification timeout and response cache.
#[derive(Debug, Clone, Deserialize)]
pub struct IntentConfig {
    /// Whether the LLM classifier participates in routing.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_threshold_high")]
    pub confidence_threshold_high: f64,
    #[serde(default = "default_threshold_low")]
    pub confidence_threshold_low: f64,
    /// Hard deadline for one classification call.
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,
    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

/// Parameter collection and tool execution limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Unusable clarification replies tolerated before the session errors.
    #[serde(default = "default_max_retries")]
    pub max_clarification_retries: u32,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// Let the LLM phrase clarification questions; the schema question is
    /// used when it fails or answers badly.
    #[serde(default)]
    pub llm_clarification_questions: bool,
}

/// Ollama endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Ollama HTTP API base URL.
    #[serde(default = "default_host")]
    pub host: String,
    /// Model to use for classification and replies.
    #[serde(default = "default_model")]
    pub model: String,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
    /// Whether an LLM backend is configured at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}
fn default_threshold_high() -> f64 {
    0.8
}
fn default_threshold_low() -> f64 {
    0.5
}
fn default_llm_timeout_secs() -> u64 {
    5
}
fn default_cache_max_size() -> usize {
    100
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    3
}
fn default_tool_timeout_secs() -> u64 {
    10
}
fn default_host() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "gemma3:270m".into()
}
fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            confidence_threshold_high: default_threshold_high(),
            confidence_threshold_low: default_threshold_low(),
            llm_timeout_secs: default_llm_timeout_secs(),
            cache_max_size: default_cache_max_size(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_clarification_retries: default_max_retries(),
            tool_timeout_secs: default_tool_timeout_secs(),
            llm_clarification_questions: false,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            model: default_model(),
            timeout_secs: default_http_timeout_secs(),
            enabled: default_true(),
        }
    }
}

impl IntentConfig {
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl LifecycleConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

impl AssistantConfig {
    /// Load and validate config from a TOML file path.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every tunable against its safe range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intent = &self.intent;
        check_f64(
            "intent.confidence_threshold_high",
            intent.confidence_threshold_high,
            0.0,
            1.0,
            "0.0..=1.0",
        )?;
        check_f64(
            "intent.confidence_threshold_low",
            intent.confidence_threshold_low,
            0.0,
            1.0,
            "0.0..=1.0",
        )?;
        if intent.confidence_threshold_high <= intent.confidence_threshold_low {
            return Err(ConfigError::ThresholdOrder {
                high: intent.confidence_threshold_high,
                low: intent.confidence_threshold_low,
            });
        }
        check_u64("intent.llm_timeout_secs", intent.llm_timeout_secs, 1, 30, "1..=30")?;
        check_u64(
            "intent.cache_max_size",
            intent.cache_max_size as u64,
            1,
            1000,
            "1..=1000",
        )?;
        check_u64("intent.cache_ttl_secs", intent.cache_ttl_secs, 60, 3600, "60..=3600")?;
        check_u64(
            "lifecycle.max_clarification_retries",
            u64::from(self.lifecycle.max_clarification_retries),
            1,
            10,
            "1..=10",
        )?;
        check_u64(
            "lifecycle.tool_timeout_secs",
            self.lifecycle.tool_timeout_secs,
            1,
            120,
            "1..=120",
        )?;
        check_u64("llm.timeout_secs", self.llm.timeout_secs, 1, 300, "1..=300")?;
        Ok(())
    }
}

fn check_f64(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
    range: &'static str,
) -> Result<(), ConfigError> {
    if value.is_nan() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value: value.to_string(),
            range,
        });
    }
    Ok(())
}

fn check_u64(
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
    range: &'static str,
) -> Result<(), ConfigError> {
    if !(min..=max).contains(&value) {
        return Err(ConfigError::OutOfRange {
            field,
            value: value.to_string(),
            range,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AssistantConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.intent.enabled);
        assert_eq!(config.intent.confidence_threshold_high, 0.8);
        assert_eq!(config.intent.confidence_threshold_low, 0.5);
        assert_eq!(config.intent.llm_timeout(), Duration::from_secs(5));
        assert_eq!(config.intent.cache_max_size, 100);
        assert_eq!(config.intent.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.lifecycle.max_clarification_retries, 3);
        assert!(!config.lifecycle.llm_clarification_questions);
        assert_eq!(config.llm.host, "http://localhost:11434");
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = AssistantConfig::from_toml_str("").unwrap();
        assert_eq!(config.intent.cache_max_size, 100);
        assert_eq!(config.lifecycle.tool_timeout_secs, 10);
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[intent]
enabled = false
confidence_threshold_high = 0.9
confidence_threshold_low = 0.4
llm_timeout_secs = 3
cache_max_size = 250
cache_ttl_secs = 600

[lifecycle]
max_clarification_retries = 5
tool_timeout_secs = 20
llm_clarification_questions = true

[llm]
host = "http://192.168.1.50:11434"
model = "llama3.2:3b"
timeout_secs = 45
"#;
        let config = AssistantConfig::from_toml_str(toml_str).unwrap();
        assert!(!config.intent.enabled);
        assert_eq!(config.intent.confidence_threshold_high, 0.9);
        assert_eq!(config.intent.cache_max_size, 250);
        assert_eq!(config.lifecycle.max_clarification_retries, 5);
        assert!(config.lifecycle.llm_clarification_questions);
        assert_eq!(config.llm.model, "llama3.2:3b");
        assert!(config.llm.enabled);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let err = AssistantConfig::from_toml_str(
            "[intent]\nconfidence_threshold_high = 0.5\nconfidence_threshold_low = 0.5\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ThresholdOrder { .. }));
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        let err =
            AssistantConfig::from_toml_str("[intent]\nconfidence_threshold_high = 1.2\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange { field: "intent.confidence_threshold_high", .. }
        ));
    }

    #[test]
    fn rejects_llm_timeout_above_cap() {
        let err = AssistantConfig::from_toml_str("[intent]\nllm_timeout_secs = 31\n").unwrap_err();
        assert!(err.to_string().contains("1..=30"));
    }

    #[test]
    fn rejects_cache_bounds() {
        assert!(AssistantConfig::from_toml_str("[intent]\ncache_max_size = 0\n").is_err());
        assert!(AssistantConfig::from_toml_str("[intent]\ncache_max_size = 1001\n").is_err());
        assert!(AssistantConfig::from_toml_str("[intent]\ncache_ttl_secs = 59\n").is_err());
        assert!(AssistantConfig::from_toml_str("[intent]\ncache_ttl_secs = 3600\n").is_ok());
    }

    #[test]
    fn rejects_zero_retries() {
        let err = AssistantConfig::from_toml_str("[lifecycle]\nmax_clarification_retries = 0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn invalid_syntax_is_parse_error() {
        let err = AssistantConfig::from_toml_str("[intent\nenabled = true").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = AssistantConfig::from_file("/nonexistent/fc.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
