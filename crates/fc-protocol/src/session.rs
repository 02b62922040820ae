use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::intent::Parameters;

/// Lifecycle state of a tool session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    ToolDetected,
    Clarifying,
    ReadyToStart,
    Running,
    Completed,
    Canceled,
    Error,
}

impl SessionState {
    /// Whether `self → next` is a legal edge of the session state machine.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, ToolDetected)
                | (ToolDetected, Clarifying)
                | (ToolDetected, ReadyToStart)
                | (Clarifying, Clarifying)
                | (Clarifying, ReadyToStart)
                | (Clarifying, Error)
                | (ReadyToStart, Running)
                | (Running, Completed)
                | (Running, Error)
                | (ToolDetected | Clarifying | ReadyToStart | Running, Canceled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ToolDetected => "tool_detected",
            Self::Clarifying => "clarifying",
            Self::ReadyToStart => "ready_to_start",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Completed,
    Cancelled,
    Error,
}

impl ToolStatus {
    /// Session state a session ends in with this status.
    pub fn terminal_state(self) -> SessionState {
        match self {
            Self::Completed => SessionState::Completed,
            Self::Cancelled => SessionState::Canceled,
            Self::Error => SessionState::Error,
        }
    }
}

/// The single structured outcome of a tool session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub session_id: Uuid,
    pub tool_name: String,
    pub status: ToolStatus,
    /// Tool output on success.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    /// Human-readable reason for `Error` / `Cancelled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

/// Read-only view of an active session, exposed to the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub conversation_id: String,
    pub tool_name: String,
    pub state: SessionState,
    pub collected_parameters: Parameters,
    pub missing_required: Vec<String>,
    pub retries: u32,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}
