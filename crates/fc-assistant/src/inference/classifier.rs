//! LLM-backed intent classifier.
//!
//! Sends the utterance (and, for follow-ups, the previous turn's context)
//! to the backend, parses the structured JSON answer and caches successful
//! classifications. Any failure surfaces as `LlmError` so the router can
//! fall back to the pattern matcher.

use std::sync::Arc;
use std::time::Duration;

use fc_protocol::{Category, DetectionMethod, Intent, Parameters};
use serde::Deserialize;
use serde_json::Value;

use super::prompts::{CLASSIFICATION_PROMPT, classification_message};
use super::{CompletionRequest, LlmBackend};
use crate::cache::{CachedValue, Fingerprint, ResponseCache};
use crate::context::ClassificationContext;
use crate::error::LlmError;

/// Confidence multiplier when the model says it needs clarification.
const CLARIFICATION_PENALTY: f64 = 0.8;

/// Classification as the model returns it. Field aliases cover the
/// alternative key names small models drift into.
#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(default, alias = "primary_intent", alias = "intent")]
    category: Option<String>,
    #[serde(default)]
    confidence: Value,
    #[serde(default, alias = "extracted_parameters")]
    parameters: Value,
    #[serde(default, alias = "multi_intent")]
    secondary_intents: Vec<RawSecondary>,
    #[serde(default)]
    clarification_needed: bool,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSecondary {
    Name(String),
    Full {
        #[serde(alias = "primary_intent", alias = "intent")]
        category: String,
        #[serde(default)]
        confidence: Value,
        #[serde(default, alias = "extracted_parameters")]
        parameters: Value,
    },
}

/// Intent classifier over an `LlmBackend`, with response caching.
pub struct LlmClassifier {
    backend: Arc<dyn LlmBackend>,
    cache: Arc<dyn ResponseCache>,
    timeout: Duration,
}

impl LlmClassifier {
    pub fn new(backend: Arc<dyn LlmBackend>, cache: Arc<dyn ResponseCache>, timeout: Duration) -> Self {
        Self {
            backend,
            cache,
            timeout,
        }
    }

    /// Classify `text`. `context` is the previous turn's category and
    /// parameters, passed only for follow-up utterances.
    pub async fn classify(
        &self,
        text: &str,
        context: Option<&ClassificationContext>,
    ) -> Result<Intent, LlmError> {
        let context_value = context.map(ClassificationContext::to_value).unwrap_or(Value::Null);
        let key = Fingerprint::derive(text, &context_value, self.backend.model());

        if let Some(CachedValue::Intent(intent)) = self.cache.get(&key) {
            tracing::debug!(key = key.as_str(), category = %intent.category, "classification cache hit");
            return Ok(intent);
        }

        let request =
            CompletionRequest::structured(CLASSIFICATION_PROMPT, classification_message(text, context));

        let content = match tokio::time::timeout(self.timeout, self.backend.complete(&request)).await {
            Ok(Ok(content)) => content,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(LlmError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
        };

        let intent = parse_classification(&content)?;
        tracing::info!(
            category = %intent.category,
            confidence = intent.confidence,
            secondary = intent.secondary_intents.len(),
            model = self.backend.model(),
            "LLM classification"
        );

        self.cache.put(key, CachedValue::Intent(intent.clone()));
        Ok(intent)
    }
}

/// Parse the backend's answer into an `Intent` with `DetectionMethod::Llm`.
pub fn parse_classification(content: &str) -> Result<Intent, LlmError> {
    let raw: RawClassification = serde_json::from_str(extract_json(content))
        .map_err(|e| LlmError::Malformed(e.to_string()))?;

    let category = match raw.category.as_deref() {
        None => Category::None,
        Some(name) => {
            Category::parse(name).ok_or_else(|| LlmError::UnknownCategory(name.to_string()))?
        }
    };

    let mut confidence = number(&raw.confidence);
    if raw.clarification_needed {
        confidence *= CLARIFICATION_PENALTY;
    }
    if let Some(reasoning) = &raw.reasoning {
        tracing::debug!(reasoning = reasoning.as_str(), "LLM reasoning");
    }

    let mut secondary: Vec<Intent> = Vec::new();
    for entry in raw.secondary_intents {
        let (name, conf, params) = match entry {
            RawSecondary::Name(name) => (name, confidence, Parameters::new()),
            RawSecondary::Full {
                category,
                confidence: c,
                parameters,
            } => (category, number(&c), object(parameters)),
        };
        let Some(cat) = Category::parse(&name) else {
            tracing::warn!(category = %name, "ignoring unknown secondary category");
            continue;
        };
        if !cat.is_tool() || cat == category || secondary.iter().any(|s| s.category == cat) {
            continue;
        }
        secondary.push(Intent::new(cat, conf, DetectionMethod::Llm).with_parameters(params));
    }

    let mut intent = Intent::new(category, confidence, DetectionMethod::Llm)
        .with_parameters(object(raw.parameters));
    intent.secondary_intents = secondary;
    Ok(intent)
}

/// Strip markdown fences and surrounding prose from a JSON answer.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    // Try ```json ... ``` first
    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    // Try ``` ... ```
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    // Outermost braces
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Numeric value or numeric string; anything else is zero.
fn number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn object(value: Value) -> Parameters {
    match value {
        Value::Object(map) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        _ => Parameters::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LruResponseCache;
    use crate::inference::mock::{ScriptedBackend, ScriptedReply};
    use serde_json::json;
    use std::num::NonZeroUsize;

    fn cache() -> Arc<LruResponseCache> {
        Arc::new(LruResponseCache::new(
            NonZeroUsize::new(16).unwrap(),
            Duration::from_secs(300),
        ))
    }

    fn classifier(backend: Arc<ScriptedBackend>) -> LlmClassifier {
        LlmClassifier::new(backend, cache(), Duration::from_secs(5))
    }

    // ── parsing ──────────────────────────────────────────────────

    #[test]
    fn parses_canonical_answer() {
        let intent = parse_classification(
            r#"{"category": "navigation", "confidence": 0.95, "parameters": {"destination": "Roma", "avoid_tolls": true}, "secondary_intents": [], "reasoning": "x", "clarification_needed": false}"#,
        )
        .unwrap();
        assert_eq!(intent.category, Category::Navigation);
        assert_eq!(intent.detection_method, DetectionMethod::Llm);
        assert!((intent.confidence - 0.95).abs() < 1e-9);
        assert_eq!(intent.parameters["destination"], "Roma");
    }

    #[test]
    fn parses_alternative_keys_and_fences() {
        let content = "Ecco:\n```json\n{\"primary_intent\": \"vehicle\", \"confidence\": \"0.9\", \"extracted_parameters\": {\"system\": \"engine\"}, \"multi_intent\": [\"weather\"]}\n```";
        let intent = parse_classification(content).unwrap();
        assert_eq!(intent.category, Category::VehicleStatus);
        assert!((intent.confidence - 0.9).abs() < 1e-9);
        assert_eq!(intent.parameters["system"], "engine");
        assert_eq!(intent.secondary_intents.len(), 1);
        assert_eq!(intent.secondary_intents[0].category, Category::Weather);
    }

    #[test]
    fn null_category_is_none() {
        let intent =
            parse_classification(r#"{"primary_intent": null, "confidence": 0.95}"#).unwrap();
        assert_eq!(intent.category, Category::None);
    }

    #[test]
    fn unknown_category_is_error() {
        let err = parse_classification(r#"{"category": "teleport", "confidence": 0.9}"#).unwrap_err();
        assert!(matches!(err, LlmError::UnknownCategory(c) if c == "teleport"));
    }

    #[test]
    fn non_json_is_malformed() {
        let err = parse_classification("Non lo so, mi dispiace.").unwrap_err();
        assert!(matches!(err, LlmError::Malformed(_)));
    }

    #[test]
    fn confidence_is_clamped_and_penalized() {
        let high = parse_classification(r#"{"category": "weather", "confidence": 7}"#).unwrap();
        assert_eq!(high.confidence, 1.0);

        let unsure = parse_classification(
            r#"{"category": "weather", "confidence": 0.9, "clarification_needed": true}"#,
        )
        .unwrap();
        assert!((unsure.confidence - 0.72).abs() < 1e-9);
    }

    #[test]
    fn secondary_intents_are_filtered() {
        let intent = parse_classification(
            r#"{"category": "navigation", "confidence": 0.9, "secondary_intents": [
                {"category": "weather", "confidence": 0.8, "parameters": {"location": "Roma"}},
                {"category": "navigation", "confidence": 0.8},
                {"category": "none", "confidence": 0.8},
                {"category": "weather", "confidence": 0.7},
                {"category": "laundry", "confidence": 0.7},
                {"category": "maintenance", "confidence": 0.6}
            ]}"#,
        )
        .unwrap();
        let cats: Vec<_> = intent.secondary_intents.iter().map(|i| i.category).collect();
        assert_eq!(cats, vec![Category::Weather, Category::Maintenance]);
        assert_eq!(intent.secondary_intents[0].parameters["location"], "Roma");
    }

    #[test]
    fn null_parameters_are_dropped() {
        let intent = parse_classification(
            r#"{"category": "weather", "confidence": 0.9, "parameters": {"location": null, "timeframe": "tomorrow"}}"#,
        )
        .unwrap();
        assert!(!intent.parameters.contains_key("location"));
        assert_eq!(intent.parameters["timeframe"], "tomorrow");
    }

    // ── classify ─────────────────────────────────────────────────

    #[tokio::test]
    async fn identical_requests_hit_the_cache() {
        let backend = Arc::new(ScriptedBackend::new("m").with_replies([
            ScriptedReply::classification("weather", 0.9, json!({})),
        ]));
        let classifier = classifier(backend.clone());

        let first = classifier.classify("Che tempo fa?", None).await.unwrap();
        let second = classifier.classify("  che TEMPO fa? ", None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn context_changes_the_cache_key() {
        let backend = Arc::new(
            ScriptedBackend::new("m").always(ScriptedReply::classification("weather", 0.9, json!({}))),
        );
        let classifier = classifier(backend.clone());
        let ctx = ClassificationContext {
            previous_category: Some(Category::Weather),
            previous_parameters: Parameters::new(),
        };

        classifier.classify("e domani?", None).await.unwrap();
        classifier.classify("e domani?", Some(&ctx)).await.unwrap();
        assert_eq!(backend.call_count(), 2);
        assert!(backend.requests()[1].user.contains("CONTESTO PRECEDENTE"));
        assert!(!backend.requests()[0].user.contains("CONTESTO PRECEDENTE"));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let backend = Arc::new(ScriptedBackend::new("m").with_replies([
            ScriptedReply::Fail("down".into()),
            ScriptedReply::classification("weather", 0.9, json!({})),
        ]));
        let classifier = classifier(backend.clone());

        assert!(classifier.classify("Che tempo fa?", None).await.is_err());
        assert!(classifier.classify("Che tempo fa?", None).await.is_ok());
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let backend = Arc::new(ScriptedBackend::new("m").with_replies([ScriptedReply::Hang]));
        let classifier = classifier(backend);

        let err = classifier.classify("Che tempo fa?", None).await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout { timeout_ms: 5000 }));
    }

    #[tokio::test]
    async fn requests_are_structured() {
        let backend = Arc::new(ScriptedBackend::new("m").with_replies([
            ScriptedReply::classification("none", 0.95, json!({})),
        ]));
        classifier(backend.clone()).classify("Ciao Frank", None).await.unwrap();
        let req = &backend.requests()[0];
        assert!(req.json);
        assert_eq!(req.system, CLASSIFICATION_PROMPT);
        assert_eq!(req.user, "RICHIESTA: Ciao Frank");
    }
}
