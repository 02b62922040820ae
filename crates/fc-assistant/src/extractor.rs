//! Parameter extraction from utterances, LLM output and clarification replies.
//!
//! Nothing is invented here: a parameter is set only when a recognizable
//! phrase maps to it, the LLM supplied a schema-compatible value, or an
//! elliptical follow-up carries it over from the previous turn.

use std::sync::{Arc, LazyLock};

use fc_protocol::{Category, Intent, Parameters};
use fc_tools::{CamperTool, ParamKind, ToolRegistry, ToolSchema};
use regex::Regex;
use serde_json::{Value, json};

use crate::context::{ConversationContext, is_follow_up};

/// Capitalized place name, optionally multi-word ("Reggio Emilia",
/// "Castiglione della Pescaia").
const PLACE: &str = r"\p{Lu}[\p{L}'’\-]*(?:\s+(?:(?:di|del|della|dei|de|sul|sulla)\s+)?\p{Lu}[\p{L}'’\-]*)*";

static DESTINATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i:\b(?:portami|porta|andiamo|andare|vai|naviga|navigare|guida|rotta|percorso|strada|direzione|take me|drive|go|navigate|route|directions)\b)[^.?!]*?(?i:\b(?:a|ad|al|alla|allo|verso|per|in|to|towards)\s+)(?P<place>{PLACE})"
    ))
    .unwrap()
});

static DESTINATION_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i:\b(?:destinazione|destination)\s*:?\s+)(?P<place>{PLACE})")).unwrap()
});

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i:\b(?:a|ad|in|su|per|di|sopra|at|for)\s+)(?P<place>{PLACE})"
    ))
    .unwrap()
});

static PLACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(PLACE).unwrap());

static AVOID_TOLLS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:evita\w*|senza|niente|no|avoid\w*|without)\b[^.?!]{0,30}?\b(?:pedagg\w*|casell\w*|tolls?)\b")
        .unwrap()
});

static AVOID_HIGHWAYS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:evita\w*|senza|niente|no|avoid\w*|without)\b[^.?!]{0,30}?\b(?:autostrad\w*|highways?|motorways?)\b")
        .unwrap()
});

static INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{1,9}\b").unwrap());

/// Keyword table for choice-valued parameters: (parameter, [(pattern, value)]).
type ChoiceRules = Vec<(&'static str, Vec<(Regex, &'static str)>)>;

fn rules(entries: &[(&'static str, &[(&'static str, &'static str)])]) -> ChoiceRules {
    entries
        .iter()
        .map(|(param, table)| {
            let compiled = table
                .iter()
                .map(|(pattern, value)| (Regex::new(&format!(r"(?i)\b(?:{pattern})\b")).unwrap(), *value))
                .collect();
            (*param, compiled)
        })
        .collect()
}

const ROUTE_TYPE_WORDS: &[(&str, &str)] = &[
    (r"più veloce|veloce|rapid[ao]|fastest|quickest", "fastest"),
    (r"più breve|breve|cort[ao]|shortest", "shortest"),
    (r"panoramic\w*|scenic", "scenic"),
];

const TIMEFRAME_WORDS: &[(&str, &str)] = &[
    (r"domani|tomorrow", "tomorrow"),
    (r"oggi|stasera|today|tonight", "today"),
    (r"weekend|fine settimana", "weekend"),
    (r"adesso|ora|in questo momento|now|right now", "now"),
];

const SYSTEM_WORDS: &[(&str, &str)] = &[
    (r"carburante|benzina|gasolio|diesel|serbatoio|autonomia|fuel|gas", "fuel"),
    (r"motore|olio|engine|oil", "engine"),
    (r"pneumatic\w*|gomme|ruote|tires?|tyres?", "tires"),
    (r"batteri\w*|battery", "battery"),
    (r"generale|tutto|completo|general|overall", "general"),
];

const MAINTENANCE_TYPE_WORDS: &[(&str, &str)] = &[
    (r"cambio(?: dell')?\s*olio|olio|oil change|oil", "oil_change"),
    (r"tagliando|revisione|ispezione|inspection|service", "inspection"),
    (r"filtr\w*|filters?", "filter"),
    (r"fren\w*|brakes?", "brakes"),
];

const TIME_FILTER_WORDS: &[(&str, &str)] = &[
    (r"scadut\w*|in ritardo|arretrat\w*|overdue|late", "overdue"),
    (r"in scadenza|scadenz\w*|prossim\w*|in arrivo|imminent\w*|upcoming|next|soon", "upcoming"),
    (r"tutt[ei]|all", "all"),
];

static NAVIGATION_CHOICES: LazyLock<ChoiceRules> =
    LazyLock::new(|| rules(&[("route_type", ROUTE_TYPE_WORDS)]));

static WEATHER_CHOICES: LazyLock<ChoiceRules> =
    LazyLock::new(|| rules(&[("timeframe", TIMEFRAME_WORDS)]));

static VEHICLE_CHOICES: LazyLock<ChoiceRules> =
    LazyLock::new(|| rules(&[("system", SYSTEM_WORDS)]));

static MAINTENANCE_CHOICES: LazyLock<ChoiceRules> = LazyLock::new(|| {
    rules(&[
        ("maintenance_type", MAINTENANCE_TYPE_WORDS),
        ("time_filter", TIME_FILTER_WORDS),
    ])
});

/// Words that make a reply a question rather than a value.
const QUESTION_WORDS: &[&str] = &[
    "come", "cosa", "chi", "dove", "quando", "perché", "perche", "quale", "quanto", "stai",
    "what", "how", "why", "who", "where", "when", "which",
];

/// Leading words stripped from a bare clarification reply.
const REPLY_FILLERS: &[&str] = &["a", "ad", "in", "per", "verso", "to", "the", "il", "la", "è", "e"];

/// Sentence openers and one-word acknowledgements that are not place names.
const NON_PLACE_OPENERS: &[&str] = &[
    "voglio", "vorrei", "dimmi", "raccontami", "fammi", "puoi", "sai", "ciao", "grazie", "boh",
    "non", "no", "si", "sì", "ok", "okay", "che", "tell", "please", "dopo", "prima", "poi", "ora",
    "adesso", "bene", "va", "forse", "niente", "nulla", "aspetta", "yes", "thanks", "later", "sure",
];

/// Lowercase words that cannot follow a place name at the start of a reply.
const ARTICLES: &[&str] = &[
    "il", "lo", "la", "i", "gli", "le", "un", "uno", "una", "mi", "ti", "ci", "the", "a", "an", "me",
];

/// Parameters literally present in `text` for `category`.
pub fn explicit_parameters(category: Category, text: &str) -> Parameters {
    let mut out = Parameters::new();
    match category {
        Category::Navigation => {
            let place = DESTINATION_RE
                .captures(text)
                .or_else(|| DESTINATION_LABEL_RE.captures(text))
                .map(|c| c["place"].to_string());
            if let Some(place) = place {
                out.insert("destination".into(), json!(place));
            }
            if AVOID_TOLLS_RE.is_match(text) {
                out.insert("avoid_tolls".into(), json!(true));
            }
            if AVOID_HIGHWAYS_RE.is_match(text) {
                out.insert("avoid_highways".into(), json!(true));
            }
            apply_choices(&NAVIGATION_CHOICES, text, &mut out);
        }
        Category::Weather => {
            if let Some(c) = LOCATION_RE.captures(text) {
                out.insert("location".into(), json!(c["place"].to_string()));
            }
            apply_choices(&WEATHER_CHOICES, text, &mut out);
        }
        Category::VehicleStatus => apply_choices(&VEHICLE_CHOICES, text, &mut out),
        Category::Maintenance => apply_choices(&MAINTENANCE_CHOICES, text, &mut out),
        Category::None => {}
    }
    out
}

fn apply_choices(rules: &ChoiceRules, text: &str, out: &mut Parameters) {
    for (param, table) in rules {
        if let Some((_, value)) = table.iter().find(|(re, _)| re.is_match(text)) {
            out.insert((*param).to_string(), json!(value));
        }
    }
}

/// Whether a reply reads as a question instead of an answer.
pub fn is_question(text: &str) -> bool {
    if text.contains('?') {
        return true;
    }
    let lower = text.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| QUESTION_WORDS.contains(&w))
}

/// A place name given as a clarification reply: a capitalized name that is
/// the whole reply or clearly not a sentence opener.
fn place_from_reply(text: &str) -> Option<String> {
    let cleaned: Vec<&str> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '’' || c == '-')))
        .filter(|w| !w.is_empty())
        .collect();
    let start = cleaned
        .iter()
        .position(|w| !REPLY_FILLERS.contains(&w.to_lowercase().as_str()))?;
    let words = &cleaned[start..];

    let joined = words.join(" ");
    for m in PLACE_RE.find_iter(&joined) {
        let first = m.as_str().split_whitespace().next().unwrap_or_default();
        if NON_PLACE_OPENERS.contains(&first.to_lowercase().as_str()) {
            continue;
        }
        if m.start() > 0 || m.end() == joined.len() {
            return Some(m.as_str().to_string());
        }
        let next = joined[m.end()..].split_whitespace().next().unwrap_or_default();
        if !ARTICLES.contains(&next.to_lowercase().as_str()) {
            return Some(m.as_str().to_string());
        }
    }
    None
}

/// A tool selected for an intent, with its parameters resolved.
pub struct Extraction {
    pub tool: Arc<dyn CamperTool>,
    pub parameters: Parameters,
    pub missing_required: Vec<String>,
}

/// Resolves tool parameters for a classified intent.
pub struct ParameterExtractor {
    registry: Arc<ToolRegistry>,
}

impl ParameterExtractor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Select the tool for `intent` and fill its parameters.
    ///
    /// Returns `None` when no tool serves the intent's category. LLM values
    /// win over pattern values when they fit the schema.
    pub fn extract(
        &self,
        intent: &Intent,
        utterance: &str,
        context: &ConversationContext,
    ) -> Option<Extraction> {
        let tool = self.registry.for_category(intent.category)?;
        let schema = tool.schema();

        let mut parameters =
            schema.retain_compatible(&explicit_parameters(intent.category, utterance));
        parameters.extend(schema.retain_compatible(&intent.parameters));

        if context.previous_category() == Some(intent.category) && is_follow_up(utterance) {
            for (k, v) in schema.retain_compatible(context.previous_parameters()) {
                parameters.entry(k).or_insert(v);
            }
        }

        let missing_required = schema.missing_required(&parameters);
        tracing::debug!(
            tool = tool.name(),
            parameters = %serde_json::Value::Object(parameters.clone()),
            missing = ?missing_required,
            "parameters extracted"
        );
        Some(Extraction {
            tool,
            parameters,
            missing_required,
        })
    }

    /// Values found in a clarification reply, greedily filling any of
    /// `missing` and any optional parameter stated explicitly.
    pub fn extract_reply(&self, tool: &dyn CamperTool, missing: &[String], text: &str) -> Parameters {
        extract_reply(tool.schema(), tool.category(), missing, text)
    }
}

fn extract_reply(schema: &ToolSchema, category: Category, missing: &[String], text: &str) -> Parameters {
    if text.trim().is_empty() || is_question(text) {
        return Parameters::new();
    }

    let mut found = schema.retain_compatible(&explicit_parameters(category, text));
    let lower = text.to_lowercase();
    let mut integers = INTEGER_RE.find_iter(text).map(|m| m.as_str().to_string());
    let mut place_used = false;

    for name in missing {
        if found.contains_key(name) {
            continue;
        }
        let Some(spec) = schema.param(name) else {
            continue;
        };
        let candidate = match spec.kind {
            ParamKind::Integer => integers.next().map(Value::String),
            ParamKind::Boolean => Some(Value::String(text.trim().to_string())),
            ParamKind::Choice(values) => values
                .iter()
                .find(|v| contains_word(&lower, &v.replace('_', " ")) || contains_word(&lower, v))
                .map(|v| json!(v)),
            ParamKind::Text if !place_used => {
                place_used = true;
                place_from_reply(text).map(Value::String)
            }
            ParamKind::Text => None,
        };
        if let Some(value) = candidate.and_then(|c| spec.coerce(&c)) {
            found.insert(name.clone(), value);
        }
    }
    found
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(i, _)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
