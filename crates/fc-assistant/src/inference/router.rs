//! Confidence-based routing between the pattern matcher and the LLM.
//!
//! ```text
//!   utterance
//!       │
//!       ├── pattern matcher (always)
//!       │
//!       └── LLM classifier (when enabled)
//!              ├── error / timeout ─────────────► pattern  (fallback)
//!              ├── conf ≥ high ─────────────────► LLM      (llm)
//!              ├── low ≤ conf < high ───────────► merge    (llm_pattern_combined)
//!              └── conf < low ──────────────────► pattern  (fallback)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fc_protocol::{Category, DetectionMethod, Intent};
use fc_tools::ToolRegistry;

use super::classifier::LlmClassifier;
use super::patterns::PatternMatcher;
use crate::config::IntentConfig;
use crate::context::{ClassificationContext, is_follow_up};
use crate::extractor::explicit_parameters;

/// Confidence penalty applied when the two classifiers disagree.
const DISAGREEMENT_PENALTY: f64 = 0.8;

/// Pattern confidence for an elliptical follow-up resolved from context.
const FOLLOW_UP_CONFIDENCE: f64 = 0.6;

/// Chooses, per utterance, which classifier's answer to trust.
pub struct ConfidenceRouter {
    patterns: PatternMatcher,
    llm: Option<LlmClassifier>,
    /// Runtime switch for `llm`, initialized from `IntentConfig::enabled`.
    llm_enabled: AtomicBool,
    registry: Arc<ToolRegistry>,
    high: f64,
    low: f64,
}

impl ConfidenceRouter {
    /// `llm` is ignored while `config.enabled` is false, until switched on
    /// with [`ConfidenceRouter::set_llm_enabled`].
    pub fn new(
        llm: Option<LlmClassifier>,
        registry: Arc<ToolRegistry>,
        config: &IntentConfig,
    ) -> Self {
        Self {
            patterns: PatternMatcher::new(),
            llm,
            llm_enabled: AtomicBool::new(config.enabled),
            registry,
            high: config.confidence_threshold_high,
            low: config.confidence_threshold_low,
        }
    }

    /// Produce exactly one intent for `text`. Never fails: every LLM
    /// problem degrades to the pattern result.
    pub async fn route(&self, text: &str, context: &ClassificationContext) -> Intent {
        let pattern = resolve_follow_up(self.patterns.classify(text), text, context);

        let Some(llm) = self.llm.as_ref().filter(|_| self.llm_enabled()) else {
            return pattern.with_method(DetectionMethod::Pattern);
        };

        let follow_up = (is_follow_up(text) && !context.is_empty()).then_some(context);
        let llm_intent = match llm.classify(text, follow_up).await {
            Ok(intent) => intent,
            Err(e) => {
                tracing::warn!(error = %e, "LLM classification failed, using pattern fallback");
                return pattern.with_method(DetectionMethod::Fallback);
            }
        };

        let intent = if llm_intent.confidence >= self.high {
            llm_intent.with_method(DetectionMethod::Llm)
        } else if llm_intent.confidence >= self.low {
            self.merge(llm_intent, pattern)
        } else {
            tracing::debug!(
                confidence = llm_intent.confidence,
                "LLM confidence below threshold, using pattern fallback"
            );
            pattern.with_method(DetectionMethod::Fallback)
        };

        tracing::info!(
            category = %intent.category,
            confidence = intent.confidence,
            method = %intent.detection_method,
            "intent routed"
        );
        intent
    }

    /// Whether the LLM classifier currently takes part in routing.
    pub fn llm_enabled(&self) -> bool {
        self.llm.is_some() && self.llm_enabled.load(Ordering::Relaxed)
    }

    /// Switch LLM classification on or off and return the resulting state.
    /// Enabling has no effect when no classifier is configured.
    pub fn set_llm_enabled(&self, enabled: bool) -> bool {
        if enabled && self.llm.is_none() {
            tracing::warn!("cannot enable LLM classification: no backend configured");
            return false;
        }
        self.llm_enabled.store(enabled, Ordering::Relaxed);
        tracing::info!(enabled, "LLM classification toggled");
        enabled
    }

    /// `(high, low)` confidence thresholds.
    pub fn thresholds(&self) -> (f64, f64) {
        (self.high, self.low)
    }

    /// Medium-confidence reconciliation. A disagreeing pattern tool category
    /// wins with a reduced confidence; LLM parameters are kept only where
    /// they fit the resulting tool's schema, overriding pattern values.
    fn merge(&self, llm: Intent, pattern: Intent) -> Intent {
        let disagree = pattern.category.is_tool() && pattern.category != llm.category;
        let (category, confidence) = if disagree {
            tracing::debug!(
                llm = %llm.category,
                pattern = %pattern.category,
                "classifiers disagree, preferring pattern category"
            );
            (
                pattern.category,
                llm.confidence.min(pattern.confidence) * DISAGREEMENT_PENALTY,
            )
        } else {
            (llm.category, llm.confidence)
        };

        let parameters = match self.registry.schema_for(category) {
            Some(schema) => {
                let mut merged = if category == pattern.category {
                    pattern.parameters
                } else {
                    Default::default()
                };
                merged.extend(schema.retain_compatible(&llm.parameters));
                merged
            }
            None => llm.parameters,
        };

        let mut intent = Intent::new(category, confidence, DetectionMethod::LlmPatternCombined)
            .with_parameters(parameters);
        intent.secondary_intents = secondaries_for(
            category,
            llm.secondary_intents.into_iter().chain(pattern.secondary_intents),
        );
        intent
    }
}

/// Keyword-less follow-ups ("e domani?") inherit the previous tool category.
fn resolve_follow_up(pattern: Intent, text: &str, context: &ClassificationContext) -> Intent {
    match context.previous_category {
        Some(previous) if previous.is_tool() && !pattern.is_actionable() && is_follow_up(text) => {
            tracing::debug!(category = %previous, "follow-up resolved from previous turn");
            Intent::new(previous, FOLLOW_UP_CONFIDENCE, pattern.detection_method)
                .with_parameters(explicit_parameters(previous, text))
        }
        _ => pattern,
    }
}

/// Secondary tool intents, excluding the primary category and duplicates.
fn secondaries_for(primary: Category, candidates: impl IntoIterator<Item = Intent>) -> Vec<Intent> {
    let mut out: Vec<Intent> = Vec::new();
    for intent in candidates {
        if intent.category.is_tool()
            && intent.category != primary
            && !out.iter().any(|i| i.category == intent.category)
        {
            out.push(intent.with_method(DetectionMethod::LlmPatternCombined));
        }
    }
    out
}
