use serde::{Deserialize, Serialize};

use crate::session::{SessionState, ToolResult};

/// Longest accepted user utterance, in characters.
pub const MAX_MESSAGE_CHARS: usize = 5000;

/// Inbound utterance from the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    pub conversation_id: String,
    pub text: String,
}

/// What a reply represents to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    /// Free-form answer from the conversational path.
    Conversational,
    /// A question asking for a missing tool parameter.
    Clarification,
    /// Input rejected while a tool session is active.
    Gating,
    /// Terminal outcome of a tool session.
    ToolResult,
    /// The utterance itself could not be processed.
    InvalidInput,
}

/// One user-visible message produced by a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantReply {
    pub conversation_id: String,
    pub kind: ReplyKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Session state after this reply, when a session was involved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SessionState>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,
}

impl AssistantReply {
    pub fn conversational(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            kind: ReplyKind::Conversational,
            text: text.into(),
            tool_name: None,
            state: None,
            missing_required: Vec::new(),
            tool_result: None,
        }
    }

    pub fn invalid_input(conversation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::InvalidInput,
            ..Self::conversational(conversation_id, text)
        }
    }
}
