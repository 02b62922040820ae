//! One tool invocation's lifecycle record.
//!
//! A `ToolSession` moves through `SessionState` only along legal edges and
//! is consumed by `finish`, so a session yields exactly one `ToolResult`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fc_protocol::{Category, Parameters, SessionSnapshot, SessionState, ToolResult, ToolStatus};
use fc_tools::CamperTool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::LifecycleError;

/// Cancellation signal for one session, tagged with its id.
///
/// Cancelling is sticky: `token().cancelled()` resolves immediately once
/// `trigger` has been called.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    session_id: Uuid,
    token: CancellationToken,
}

impl CancelHandle {
    fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            token: CancellationToken::new(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

pub struct ToolSession {
    id: Uuid,
    conversation_id: String,
    tool: Arc<dyn CamperTool>,
    collected: Parameters,
    missing: Vec<String>,
    state: SessionState,
    retries: u32,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    cancel: CancelHandle,
}

impl ToolSession {
    pub fn new(conversation_id: impl Into<String>, tool: Arc<dyn CamperTool>) -> Self {
        let id = Uuid::now_v7();
        let now = Utc::now();
        Self {
            id,
            conversation_id: conversation_id.into(),
            tool,
            collected: Parameters::new(),
            missing: Vec::new(),
            state: SessionState::Idle,
            retries: 0,
            created_at: now,
            last_activity_at: now,
            cancel: CancelHandle::new(id),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn tool(&self) -> Arc<dyn CamperTool> {
        Arc::clone(&self.tool)
    }

    pub fn tool_name(&self) -> &str {
        self.tool.name()
    }

    pub fn category(&self) -> Category {
        self.tool.category()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn collected(&self) -> &Parameters {
        &self.collected
    }

    /// Required parameters still unset, in schema order.
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Move to `to` if the edge is legal.
    pub fn transition(&mut self, to: SessionState) -> Result<(), LifecycleError> {
        if !self.state.can_transition_to(to) {
            return Err(LifecycleError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::debug!(
            session_id = %self.id,
            tool = self.tool.name(),
            from = %self.state,
            to = %to,
            "session transition"
        );
        self.state = to;
        self.touch();
        Ok(())
    }

    /// Merge schema-compatible values into the collected parameters.
    /// Returns the names actually stored.
    pub fn collect(&mut self, parameters: &Parameters) -> Vec<String> {
        let accepted = self.tool.schema().retain_compatible(parameters);
        let names: Vec<String> = accepted.keys().cloned().collect();
        self.collected.extend(accepted);
        self.missing = self.tool.schema().missing_required(&self.collected);
        self.touch();
        names
    }

    pub fn record_retry(&mut self) -> u32 {
        self.retries += 1;
        self.touch();
        self.retries
    }

    /// Collected values with schema defaults filled in.
    pub fn invocation_parameters(&self) -> Parameters {
        self.tool.schema().with_defaults(&self.collected)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            conversation_id: self.conversation_id.clone(),
            tool_name: self.tool.name().to_string(),
            state: self.state,
            collected_parameters: self.collected.clone(),
            missing_required: self.missing.clone(),
            retries: self.retries,
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
        }
    }

    /// Enter the terminal state for `status` and produce the result.
    ///
    /// On an illegal edge the session is handed back with the error.
    pub fn finish(
        mut self,
        status: ToolStatus,
        payload: Option<serde_json::Value>,
        error_detail: Option<String>,
    ) -> Result<ToolResult, (Self, LifecycleError)> {
        if let Err(e) = self.transition(status.terminal_state()) {
            return Err((self, e));
        }
        Ok(ToolResult {
            session_id: self.id,
            tool_name: self.tool.name().to_string(),
            status,
            payload,
            error_detail,
        })
    }

    fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }
}

impl std::fmt::Debug for ToolSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSession")
            .field("id", &self.id)
            .field("tool", &self.tool.name())
            .field("state", &self.state)
            .field("missing", &self.missing)
            .field("retries", &self.retries)
            .finish()
    }
}
