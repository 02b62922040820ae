//! Per-conversation context used for follow-up resolution.

use std::collections::VecDeque;

use fc_protocol::{Category, Parameters};
use serde::Serialize;

/// Turns kept for the conversational prompt.
const MAX_TURNS: usize = 10;

/// Openers that mark an utterance as a follow-up of the previous turn.
const FOLLOW_UP_OPENERS: &[&str] = &[
    "e per", "e domani", "e oggi", "e quello", "e questo", "e dopo", "e prima", "e poi",
    "e a ", "e in ", "come va", "come sta", "and ", "what about", "how about",
];

/// Words that make an utterance depend on what came before.
const FOLLOW_UP_WORDS: &[&str] = &["anche", "pure", "also", "too"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// What the classifier sees of the previous turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassificationContext {
    pub previous_category: Option<Category>,
    pub previous_parameters: Parameters,
}

impl ClassificationContext {
    pub fn is_empty(&self) -> bool {
        self.previous_category.is_none() && self.previous_parameters.is_empty()
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Rolling state of one conversation.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    previous_category: Option<Category>,
    previous_parameters: Parameters,
    turns: VecDeque<Turn>,
}

impl ConversationContext {
    pub fn record_user(&mut self, text: &str) {
        self.push(Role::User, text);
    }

    pub fn record_assistant(&mut self, text: &str) {
        self.push(Role::Assistant, text);
    }

    /// Remember the last executed tool intent.
    pub fn record_tool(&mut self, category: Category, parameters: &Parameters) {
        self.previous_category = Some(category);
        self.previous_parameters = parameters.clone();
    }

    pub fn classification_context(&self) -> ClassificationContext {
        ClassificationContext {
            previous_category: self.previous_category,
            previous_parameters: self.previous_parameters.clone(),
        }
    }

    pub fn previous_category(&self) -> Option<Category> {
        self.previous_category
    }

    pub fn previous_parameters(&self) -> &Parameters {
        &self.previous_parameters
    }

    /// Most recent turns, oldest first.
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    fn push(&mut self, role: Role, text: &str) {
        if self.turns.len() == MAX_TURNS {
            self.turns.pop_front();
        }
        self.turns.push_back(Turn {
            role,
            text: text.to_string(),
        });
    }
}

/// Whether `text` is an elliptical follow-up ("e domani?", "e per Firenze?").
pub fn is_follow_up(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    if FOLLOW_UP_OPENERS.iter().any(|o| lower.starts_with(o)) {
        return true;
    }
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| FOLLOW_UP_WORDS.contains(&w))
}
