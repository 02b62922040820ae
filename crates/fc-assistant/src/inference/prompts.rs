//! Prompt text for the LLM backend.

use fc_protocol::Parameters;

use crate::context::{ClassificationContext, Role, Turn};

/// System prompt for structured intent classification.
pub const CLASSIFICATION_PROMPT: &str = r#"Sei Frank, l'assistente di bordo di un camper. Classifica la richiesta dell'utente.

CATEGORIE:
- navigation: rotte, destinazioni, percorsi. Parametri: destination (testo), avoid_tolls (bool), avoid_highways (bool), route_type (fastest|shortest|scenic)
- weather: meteo e previsioni. Parametri: location (testo), timeframe (now|today|tomorrow|weekend)
- vehicle_status: carburante, motore, pneumatici, batteria. Parametri: system (general|fuel|engine|tires|battery)
- maintenance: tagliandi, scadenze, revisioni. Parametri: maintenance_type (general|oil_change|inspection|filter|brakes), time_filter (all|overdue|upcoming)
- none: conversazione senza strumenti

Rispondi SOLO con un oggetto JSON:
{"category": "<categoria>", "confidence": <0.0-1.0>, "parameters": {...}, "secondary_intents": [{"category": "<categoria>", "confidence": <0.0-1.0>, "parameters": {...}}], "reasoning": "<breve>", "clarification_needed": <true|false>}

Includi solo i parametri detti esplicitamente. Se la richiesta contiene più azioni, metti la principale in "category" e le altre in "secondary_intents" nell'ordine in cui compaiono.

ESEMPI:
"Portami a Roma evitando i pedaggi" -> {"category": "navigation", "confidence": 0.95, "parameters": {"destination": "Roma", "avoid_tolls": true}, "secondary_intents": [], "reasoning": "navigazione verso Roma", "clarification_needed": false}
"Come va il motore?" -> {"category": "vehicle_status", "confidence": 0.9, "parameters": {"system": "engine"}, "secondary_intents": [], "reasoning": "stato motore", "clarification_needed": false}
"Ciao Frank" -> {"category": "none", "confidence": 0.95, "parameters": {}, "secondary_intents": [], "reasoning": "saluto", "clarification_needed": false}"#;

/// System prompt for free conversation.
pub const CONVERSATION_PROMPT: &str = "Sei Frank, l'assistente di bordo di un camper. \
Rispondi in italiano, in modo cordiale e conciso (al massimo tre frasi). \
Non inventare dati sul veicolo, sul meteo o sui percorsi: per quelli esistono strumenti dedicati.";

/// System prompt for phrasing one clarification question.
pub const QUESTION_PROMPT: &str = "Sei Frank, l'assistente di bordo di un camper. \
Per completare un'azione manca un dato: scrivi UNA sola domanda breve in italiano per chiederlo all'utente. \
Rispondi solo con la domanda, su una riga, terminando con il punto interrogativo.";

/// User message describing the missing parameter and what is already known.
pub fn question_message(
    tool: &str,
    tool_description: &str,
    parameter: &str,
    parameter_description: &str,
    collected: &Parameters,
) -> String {
    let mut out = format!("AZIONE: {tool} ({tool_description})\nDATO MANCANTE: {parameter}");
    if !parameter_description.is_empty() {
        out.push_str(&format!(" ({parameter_description})"));
    }
    if !collected.is_empty() {
        out.push_str(&format!(
            "\nDATI GIÀ RACCOLTI: {}",
            serde_json::Value::Object(collected.clone())
        ));
    }
    out
}

/// User message for classification. Context is only included when present.
pub fn classification_message(text: &str, context: Option<&ClassificationContext>) -> String {
    match context.filter(|c| !c.is_empty()) {
        Some(ctx) => format!(
            "CONTESTO PRECEDENTE: {}\nRICHIESTA: {text}",
            ctx.to_value()
        ),
        None => format!("RICHIESTA: {text}"),
    }
}

/// User message for a conversational reply, with the recent transcript.
pub fn conversation_message<'a>(text: &str, history: impl Iterator<Item = &'a Turn>) -> String {
    let mut out = String::new();
    for turn in history {
        let speaker = match turn.role {
            Role::User => "Utente",
            Role::Assistant => "Frank",
        };
        out.push_str(speaker);
        out.push_str(": ");
        out.push_str(&turn.text);
        out.push('\n');
    }
    out.push_str("Utente: ");
    out.push_str(text);
    out
}
