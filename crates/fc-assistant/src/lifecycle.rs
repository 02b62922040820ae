//! Tool session lifecycle: clarification, gating, execution, cancellation.
//!
//! ```text
//!   idle → tool_detected ─┬─ all required present ─► ready_to_start → running ─┬► completed
//!                         │                                                   └► error
//!                         └─ missing ─► clarifying ⟲ (reply / gating notice)
//!                                          ├─ filled ─► ready_to_start
//!                                          └─ retries exhausted ─► error
//!   any non-terminal, non-idle state ─► canceled
//! ```
//!
//! Every operation consumes the `ToolSession` and hands it back inside
//! `Step::AwaitingInput` while the session still needs the user; a terminal
//! session is consumed into exactly one `ToolResult`.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::Utc;
use fc_protocol::{
    AssistantEvent, Category, Parameters, ReplyKind, SessionState, ToolResult, ToolStatus,
};
use fc_tools::ToolOutput;
use regex::Regex;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::config::LifecycleConfig;
use crate::error::LifecycleError;
use crate::extractor::{Extraction, ParameterExtractor};
use crate::questions::QuestionWriter;
use crate::session::ToolSession;

static CANCELLATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(annulla|cancella|stop|basta|esci|ferma|interrompi|abbandona|lascia perdere|non importa|dimenticalo|cancel|abort|quit|exit|never mind)\b",
    )
    .unwrap()
});

/// Whether `text` asks to abandon the current tool session.
pub fn is_cancellation(text: &str) -> bool {
    CANCELLATION_RE.is_match(text)
}

/// Terminal outcome of a session, with what the user should read.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub result: ToolResult,
    pub message: String,
    pub category: Category,
    /// Parameters the tool ran (or would have run) with.
    pub parameters: Parameters,
}

/// Where a session stands after an operation.
#[derive(Debug)]
pub enum Step {
    /// The session waits for the user's next message.
    AwaitingInput {
        session: ToolSession,
        kind: ReplyKind,
        message: String,
    },
    Finished(Outcome),
}

enum Execution {
    Done(ToolOutput),
    Failed(String),
    TimedOut,
    Cancelled,
}

/// Drives `ToolSession`s through the state machine and emits progress
/// events.
pub struct ToolLifecycleManager {
    extractor: Arc<ParameterExtractor>,
    events: broadcast::Sender<AssistantEvent>,
    max_retries: u32,
    tool_timeout: Duration,
    questions: QuestionWriter,
}

impl ToolLifecycleManager {
    pub fn new(
        extractor: Arc<ParameterExtractor>,
        events: broadcast::Sender<AssistantEvent>,
        config: &LifecycleConfig,
    ) -> Self {
        Self {
            extractor,
            events,
            max_retries: config.max_clarification_retries,
            tool_timeout: config.tool_timeout(),
            questions: QuestionWriter::fixed(),
        }
    }

    /// Replace the schema-only question writer.
    pub fn with_questions(mut self, questions: QuestionWriter) -> Self {
        self.questions = questions;
        self
    }

    /// Open a session for a selected tool (idle → tool_detected).
    pub fn begin(
        &self,
        conversation_id: &str,
        extraction: Extraction,
    ) -> Result<ToolSession, LifecycleError> {
        let mut session = ToolSession::new(conversation_id, extraction.tool);
        session.transition(SessionState::ToolDetected)?;
        session.collect(&extraction.parameters);

        tracing::info!(
            session_id = %session.id(),
            conversation_id,
            tool = session.tool_name(),
            missing = ?session.missing(),
            "tool session started"
        );
        let _ = self.events.send(AssistantEvent::SessionStarted {
            conversation_id: conversation_id.to_string(),
            session_id: session.id(),
            tool_name: session.tool_name().to_string(),
            state: session.state(),
            parameters: session.collected().clone(),
            missing_required: session.missing().to_vec(),
            timestamp: Utc::now(),
        });
        Ok(session)
    }

    /// Run the tool if nothing required is missing, otherwise ask for the
    /// first missing parameter.
    pub async fn advance(&self, session: ToolSession) -> Result<Step, LifecycleError> {
        self.proceed(session, None).await
    }

    /// Interpret the user's message while the session is clarifying.
    pub async fn handle_reply(
        &self,
        mut session: ToolSession,
        text: &str,
    ) -> Result<Step, LifecycleError> {
        if session.cancel_handle().is_triggered() {
            return self.cancel(session, "cancel requested").map(Step::Finished);
        }
        if is_cancellation(text) {
            return self.cancel(session, "cancelled by user").map(Step::Finished);
        }

        let found = self
            .extractor
            .extract_reply(session.tool().as_ref(), session.missing(), text);
        let missing_before = session.missing().to_vec();
        let stored = session.collect(&found);

        for name in &stored {
            let _ = self.events.send(AssistantEvent::ParameterReceived {
                conversation_id: session.conversation_id().to_string(),
                session_id: session.id(),
                tool_name: session.tool_name().to_string(),
                parameter: name.clone(),
                value: session.collected()[name.as_str()].clone(),
                missing_required: session.missing().to_vec(),
                timestamp: Utc::now(),
            });
        }

        if stored.iter().any(|name| missing_before.contains(name)) {
            return self.proceed(session, None).await;
        }

        let attempts = session.record_retry();
        if attempts > self.max_retries {
            return self.give_up(session).map(Step::Finished);
        }

        let notice = format!(
            "Sto ancora raccogliendo i dati per {}: manca {}. Rispondi alla domanda oppure scrivi \"annulla\" per interrompere.",
            session.tool_name(),
            session.missing().join(", ")
        );
        tracing::debug!(
            session_id = %session.id(),
            attempts,
            "reply did not fill a required parameter"
        );
        let _ = self.events.send(AssistantEvent::GatingNotice {
            conversation_id: session.conversation_id().to_string(),
            session_id: session.id(),
            tool_name: session.tool_name().to_string(),
            state: session.state(),
            missing_required: session.missing().to_vec(),
            message: notice.clone(),
            timestamp: Utc::now(),
        });
        self.proceed(session, Some(notice)).await
    }

    /// Cancel a live session.
    pub fn cancel(&self, session: ToolSession, reason: &str) -> Result<Outcome, LifecycleError> {
        tracing::info!(
            session_id = %session.id(),
            tool = session.tool_name(),
            state = %session.state(),
            reason,
            "tool session cancelled"
        );
        self.conclude(
            session,
            ToolStatus::Cancelled,
            None,
            Some(reason.to_string()),
            "Operazione annullata.".to_string(),
        )
    }

    async fn proceed(
        &self,
        mut session: ToolSession,
        notice: Option<String>,
    ) -> Result<Step, LifecycleError> {
        let Some(parameter) = session.missing().first().cloned() else {
            session.transition(SessionState::ReadyToStart)?;
            return self.run(session).await.map(Step::Finished);
        };

        session.transition(SessionState::Clarifying)?;
        let question = self
            .questions
            .question(session.tool().as_ref(), &parameter, session.collected())
            .await;

        let _ = self.events.send(AssistantEvent::ClarificationRequested {
            conversation_id: session.conversation_id().to_string(),
            session_id: session.id(),
            tool_name: session.tool_name().to_string(),
            state: session.state(),
            parameter,
            question: question.clone(),
            missing_required: session.missing().to_vec(),
            attempt: session.retries() + 1,
            timestamp: Utc::now(),
        });

        let (kind, message) = match notice {
            Some(notice) => (ReplyKind::Gating, format!("{notice} {question}")),
            None => (ReplyKind::Clarification, question),
        };
        Ok(Step::AwaitingInput {
            session,
            kind,
            message,
        })
    }

    async fn run(&self, mut session: ToolSession) -> Result<Outcome, LifecycleError> {
        session.transition(SessionState::Running)?;
        let parameters = session.invocation_parameters();

        let _ = self.events.send(AssistantEvent::ToolStarted {
            conversation_id: session.conversation_id().to_string(),
            session_id: session.id(),
            tool_name: session.tool_name().to_string(),
            state: session.state(),
            parameters: parameters.clone(),
            timestamp: Utc::now(),
        });

        let tool = session.tool();
        let cancel = session.cancel_handle();
        let started = Instant::now();
        let mut task = tokio::spawn(async move { tool.execute(&parameters).await });

        let execution = tokio::select! {
            biased;
            _ = cancel.token().cancelled() => Execution::Cancelled,
            joined = tokio::time::timeout(self.tool_timeout, &mut task) => match joined {
                Ok(Ok(Ok(output))) => Execution::Done(output),
                Ok(Ok(Err(e))) => Execution::Failed(e.to_string()),
                Ok(Err(e)) => Execution::Failed(format!("tool task failed: {e}")),
                Err(_) => Execution::TimedOut,
            },
        };
        if !task.is_finished() {
            task.abort();
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let tool_name = session.tool_name().to_string();
        match execution {
            Execution::Done(output) => {
                tracing::info!(session_id = %session.id(), tool = %tool_name, elapsed_ms, "tool completed");
                self.conclude(
                    session,
                    ToolStatus::Completed,
                    Some(output.data),
                    None,
                    output.summary,
                )
            }
            Execution::Failed(detail) => {
                tracing::warn!(session_id = %session.id(), tool = %tool_name, error = %detail, "tool failed");
                self.conclude(
                    session,
                    ToolStatus::Error,
                    None,
                    Some(detail),
                    "Non è stato possibile completare la richiesta. Riprova più tardi.".to_string(),
                )
            }
            Execution::TimedOut => {
                tracing::warn!(
                    session_id = %session.id(),
                    tool = %tool_name,
                    timeout_ms = self.tool_timeout.as_millis() as u64,
                    "tool timed out"
                );
                self.conclude(
                    session,
                    ToolStatus::Error,
                    None,
                    Some(format!("timed out after {}s", self.tool_timeout.as_secs())),
                    "La richiesta sta impiegando troppo tempo. Riprova più tardi.".to_string(),
                )
            }
            Execution::Cancelled => self.cancel(session, "cancelled while running"),
        }
    }

    fn give_up(&self, session: ToolSession) -> Result<Outcome, LifecycleError> {
        let parameter = session.missing().first().cloned().unwrap_or_default();
        tracing::warn!(
            session_id = %session.id(),
            tool = session.tool_name(),
            parameter = %parameter,
            retries = session.retries(),
            "clarification retries exhausted"
        );
        let detail = format!(
            "no usable value for '{parameter}' after {} attempts",
            session.retries()
        );
        self.conclude(
            session,
            ToolStatus::Error,
            None,
            Some(detail),
            "Non sono riuscito a ottenere le informazioni necessarie, quindi ho annullato l'operazione. Puoi riprovare quando vuoi.".to_string(),
        )
    }

    fn conclude(
        &self,
        session: ToolSession,
        status: ToolStatus,
        payload: Option<serde_json::Value>,
        error_detail: Option<String>,
        message: String,
    ) -> Result<Outcome, LifecycleError> {
        let conversation_id = session.conversation_id().to_string();
        let category = session.category();
        let parameters = session.invocation_parameters();
        let from_state = session.state();

        let result = session
            .finish(status, payload, error_detail)
            .map_err(|(_, e)| e)?;

        let event = match status {
            ToolStatus::Cancelled => AssistantEvent::ToolCancelled {
                conversation_id,
                session_id: result.session_id,
                tool_name: result.tool_name.clone(),
                from_state,
                reason: result.error_detail.clone().unwrap_or_default(),
                timestamp: Utc::now(),
            },
            ToolStatus::Completed | ToolStatus::Error => AssistantEvent::ToolFinished {
                conversation_id,
                session_id: result.session_id,
                tool_name: result.tool_name.clone(),
                status,
                state: status.terminal_state(),
                error_detail: result.error_detail.clone(),
                timestamp: Utc::now(),
            },
        };
        let _ = self.events.send(event);

        Ok(Outcome {
            result,
            message,
            category,
            parameters,
        })
    }
}
