//! Progress events emitted by the assistant while handling a turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::intent::{Category, DetectionMethod, Parameters};
use crate::session::{SessionState, ToolStatus};

/// Ordered notifications pushed to the transport/UI channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantEvent {
    /// An utterance was classified.
    IntentDetected {
        conversation_id: String,
        category: Category,
        confidence: f64,
        detection_method: DetectionMethod,
        tool_name: Option<String>,
        #[serde(default)]
        secondary: Vec<Category>,
        timestamp: DateTime<Utc>,
    },

    /// A tool session was opened for a selected tool.
    SessionStarted {
        conversation_id: String,
        session_id: Uuid,
        tool_name: String,
        state: SessionState,
        parameters: Parameters,
        missing_required: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// The session asked the user for a missing parameter.
    ClarificationRequested {
        conversation_id: String,
        session_id: Uuid,
        tool_name: String,
        state: SessionState,
        parameter: String,
        question: String,
        missing_required: Vec<String>,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },

    /// A clarification reply supplied a parameter value.
    ParameterReceived {
        conversation_id: String,
        session_id: Uuid,
        tool_name: String,
        parameter: String,
        value: serde_json::Value,
        missing_required: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// Input was rejected while a session is collecting parameters.
    GatingNotice {
        conversation_id: String,
        session_id: Uuid,
        tool_name: String,
        state: SessionState,
        missing_required: Vec<String>,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Tool execution began.
    ToolStarted {
        conversation_id: String,
        session_id: Uuid,
        tool_name: String,
        state: SessionState,
        parameters: Parameters,
        timestamp: DateTime<Utc>,
    },

    /// Tool session ended with a completed or error result.
    ToolFinished {
        conversation_id: String,
        session_id: Uuid,
        tool_name: String,
        status: ToolStatus,
        state: SessionState,
        error_detail: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Tool session was cancelled.
    ToolCancelled {
        conversation_id: String,
        session_id: Uuid,
        tool_name: String,
        /// State the session was in when cancelled.
        from_state: SessionState,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl AssistantEvent {
    pub fn conversation_id(&self) -> &str {
        match self {
            Self::IntentDetected { conversation_id, .. }
            | Self::SessionStarted { conversation_id, .. }
            | Self::ClarificationRequested { conversation_id, .. }
            | Self::ParameterReceived { conversation_id, .. }
            | Self::GatingNotice { conversation_id, .. }
            | Self::ToolStarted { conversation_id, .. }
            | Self::ToolFinished { conversation_id, .. }
            | Self::ToolCancelled { conversation_id, .. } => conversation_id,
        }
    }

    /// The serde tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IntentDetected { .. } => "intent_detected",
            Self::SessionStarted { .. } => "session_started",
            Self::ClarificationRequested { .. } => "clarification_requested",
            Self::ParameterReceived { .. } => "parameter_received",
            Self::GatingNotice { .. } => "gating_notice",
            Self::ToolStarted { .. } => "tool_started",
            Self::ToolFinished { .. } => "tool_finished",
            Self::ToolCancelled { .. } => "tool_cancelled",
        }
    }
}
