//! Deterministic keyword classifier.
//!
//! Always available and never fails: an utterance with no keyword hits
//! classifies as `Category::None`. Confidence grows with the number of hits
//! and drops when keywords of another category are also present.

use std::sync::LazyLock;

use fc_protocol::{Category, DetectionMethod, Intent};
use regex::Regex;

use crate::extractor::explicit_parameters;

static NAVIGATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(rotta|percorso|itinerario|navigazione|navigator\w*|naviga|direzion[ei]|strada|portami|andare|andiamo|vai|destinazione|gps|mappa|autostrad[ae]|pedagg[io]|traffico|route|navigate|directions|take me|drive to)\b",
    )
    .unwrap()
});

static WEATHER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(meteo|tempo fa|che tempo|pioggia|piove|pioverà|sole|soleggiato|previsioni|clima|nuvol\w*|vento|temporal[ei]|neve|nevica|grandine|caldo|freddo|weather|forecast|rain\w*|sunny|snow)\b",
    )
    .unwrap()
});

static VEHICLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(stato del veicolo|veicolo|carburante|benzina|gasolio|diesel|serbatoio|motore|pneumatic[io]|gomme|pressione|diagnostic[ao]|obd|batteri[ae]|liquidi|livello|autonomia|vehicle|fuel|engine|tires?|battery)\b",
    )
    .unwrap()
});

static MAINTENANCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(manutenzion[ei]|scadenz[ae]|scadut[oaie]|tagliando|revisione|promemoria|sostituzione|filtr[oi]|cambio olio|cambio dell'olio|fren[oi]|officina|maintenance|service|oil change|brakes?)\b",
    )
    .unwrap()
});

fn rule(category: Category) -> Option<&'static Regex> {
    match category {
        Category::Navigation => Some(&NAVIGATION_RE),
        Category::Weather => Some(&WEATHER_RE),
        Category::VehicleStatus => Some(&VEHICLE_RE),
        Category::Maintenance => Some(&MAINTENANCE_RE),
        Category::None => None,
    }
}

fn confidence_for(hits: usize, mixed: bool) -> f64 {
    let confidence = (0.6 + 0.15 * (hits as f64 - 1.0)).min(0.95);
    if mixed { confidence - 0.1 } else { confidence }
}

/// Keyword-rule classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternMatcher;

impl PatternMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Classify `text`. Ties between categories resolve in
    /// `Category::TOOL_CATEGORIES` order; every other matched category
    /// becomes a secondary intent, strongest first.
    pub fn classify(&self, text: &str) -> Intent {
        let mut scores: Vec<(Category, usize)> = Category::TOOL_CATEGORIES
            .iter()
            .filter_map(|&c| rule(c).map(|re| (c, re.find_iter(text).count())))
            .filter(|(_, hits)| *hits > 0)
            .collect();

        // stable sort keeps declaration order among equal scores
        scores.sort_by(|a, b| b.1.cmp(&a.1));

        let Some(&(category, hits)) = scores.first() else {
            return Intent::none(DetectionMethod::Pattern);
        };
        let mixed = scores.len() > 1;
        let confidence = confidence_for(hits, mixed);

        tracing::debug!(%category, hits, confidence, secondary = scores.len() - 1, "pattern classification");
        let mut intent = Intent::new(category, confidence, DetectionMethod::Pattern)
            .with_parameters(explicit_parameters(category, text));
        intent.secondary_intents = scores[1..]
            .iter()
            .map(|&(c, hits)| {
                Intent::new(c, confidence_for(hits, mixed), DetectionMethod::Pattern)
                    .with_parameters(explicit_parameters(c, text))
            })
            .collect();
        intent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(text: &str) -> Intent {
        PatternMatcher::new().classify(text)
    }

    #[test]
    fn navigation_with_parameters() {
        let intent = classify("Portami a Roma evitando i pedaggi");
        assert_eq!(intent.category, Category::Navigation);
        assert_eq!(intent.parameters["destination"], json!("Roma"));
        assert_eq!(intent.parameters["avoid_tolls"], json!(true));
        // portami + pedaggi
        assert!((intent.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn weather_without_location() {
        let intent = classify("Che tempo fa?");
        assert_eq!(intent.category, Category::Weather);
        assert!(!intent.parameters.contains_key("location"));
        assert!(intent.confidence >= 0.6);
    }

    #[test]
    fn vehicle_and_maintenance() {
        assert_eq!(classify("Come sta il motore?").category, Category::VehicleStatus);
        assert_eq!(classify("Quando scade il tagliando?").category, Category::Maintenance);
        assert_eq!(classify("check the battery").category, Category::VehicleStatus);
    }

    #[test]
    fn small_talk_is_none() {
        let intent = classify("Ciao, come ti chiami?");
        assert_eq!(intent.category, Category::None);
        assert_eq!(intent.confidence, 0.0);
        assert!(intent.parameters.is_empty());
    }

    #[test]
    fn mixed_keywords_lower_confidence() {
        let single = classify("previsioni meteo");
        let mixed = classify("previsioni meteo e stato del motore");
        assert_eq!(mixed.category, Category::Weather);
        assert!(mixed.confidence < single.confidence);
    }

    #[test]
    fn other_matched_categories_become_secondaries() {
        let intent = classify("Portami a Roma e dimmi che tempo fa");
        assert_eq!(intent.category, Category::Navigation);
        let secondary: Vec<Category> = intent.secondary_intents.iter().map(|i| i.category).collect();
        assert_eq!(secondary, vec![Category::Weather]);
        assert_eq!(intent.secondary_intents[0].detection_method, DetectionMethod::Pattern);

        assert!(classify("Che tempo fa?").secondary_intents.is_empty());
        assert!(classify("Ciao").secondary_intents.is_empty());
    }

    #[test]
    fn ties_follow_category_order() {
        // one navigation hit, one weather hit
        let intent = classify("strada e pioggia");
        assert_eq!(intent.category, Category::Navigation);
    }

    #[test]
    fn confidence_is_capped() {
        let intent = classify("rotta percorso navigazione gps mappa traffico destinazione");
        assert!(intent.confidence <= 0.95);
    }

    #[test]
    fn word_boundaries_are_respected() {
        // "soleil" must not match "sole"; "vaiolo" must not match "vai"
        assert_eq!(classify("soleil vaiolo").category, Category::None);
    }
}
