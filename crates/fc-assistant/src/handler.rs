//! Per-message orchestration.
//!
//! `AiHandler` is the single entry point for the transport: it validates
//! the utterance, routes it through classification, dispatches tool intents
//! to the lifecycle manager (one active session per conversation) and falls
//! back to the conversational responder for everything else.
//!
//! Turns for the same conversation are serialized; different conversations
//! proceed independently. An explicit `cancel` may arrive while a turn is in
//! flight and is observed by the running tool through the session's
//! `CancelHandle`. A cancellation phrase sent while a tool is running takes
//! the same path instead of queueing behind the turn.
//!
//! Conversations idle for longer than [`CONVERSATION_IDLE_TTL`] with no
//! open session are dropped the next time any conversation is touched.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use fc_protocol::{
    AssistantEvent, AssistantReply, AssistantStatus, Intent, MAX_MESSAGE_CHARS, ReplyKind,
    SessionSnapshot, ToolStatus,
};
use fc_tools::ToolRegistry;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::cache::{LruResponseCache, ResponseCache};
use crate::config::AssistantConfig;
use crate::context::ConversationContext;
use crate::error::{LifecycleError, LlmError};
use crate::extractor::ParameterExtractor;
use crate::inference::{ConfidenceRouter, LlmBackend, LlmClassifier, OllamaBackend};
use crate::lifecycle::{Outcome, Step, ToolLifecycleManager, is_cancellation};
use crate::questions::QuestionWriter;
use crate::responder::ConversationalResponder;
use crate::session::{CancelHandle, ToolSession};

const INTERNAL_ERROR_REPLY: &str = "Si è verificato un errore interno. Riprova.";

/// Idle time after which a conversation without a session is forgotten.
pub const CONVERSATION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Mutable state of one conversation, guarded by the slot's async mutex.
#[derive(Default)]
struct Conversation {
    context: ConversationContext,
    session: Option<ToolSession>,
    /// Secondary intents waiting for the current session to end.
    queued: VecDeque<(Intent, String)>,
}

struct Slot {
    conversation: tokio::sync::Mutex<Conversation>,
    /// Cancel handle of the live session, readable without the turn lock.
    active: Mutex<Option<CancelHandle>>,
    last_seen: Mutex<Instant>,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            conversation: tokio::sync::Mutex::default(),
            active: Mutex::new(None),
            last_seen: Mutex::new(Instant::now()),
        }
    }
}

impl Slot {
    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Untouched for `ttl` and not holding a session. A slot whose turn lock
    /// is taken is in use.
    fn is_idle(&self, ttl: Duration) -> bool {
        let last_seen = *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
        last_seen.elapsed() >= ttl
            && self
                .conversation
                .try_lock()
                .is_ok_and(|conv| conv.session.is_none())
    }

    fn active(&self) -> Option<CancelHandle> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_active(&self, handle: Option<CancelHandle>) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = handle;
    }
}

pub struct AiHandler {
    router: ConfidenceRouter,
    extractor: Arc<ParameterExtractor>,
    lifecycle: ToolLifecycleManager,
    responder: ConversationalResponder,
    registry: Arc<ToolRegistry>,
    cache: Arc<dyn ResponseCache>,
    model: Option<String>,
    llm_timeout: Duration,
    events: broadcast::Sender<AssistantEvent>,
    conversations: Mutex<HashMap<String, Arc<Slot>>>,
}

impl AiHandler {
    /// Build with injected collaborators. `backend` is used for
    /// classification, conversation and (when configured) clarification
    /// questions; `None` means pattern-only routing and the fixed apology for
    /// small talk.
    pub fn new(
        config: &AssistantConfig,
        registry: Arc<ToolRegistry>,
        backend: Option<Arc<dyn LlmBackend>>,
        cache: Arc<dyn ResponseCache>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        let backend = backend.filter(|_| config.llm.enabled);
        let classifier = backend
            .clone()
            .map(|b| LlmClassifier::new(b, cache.clone(), config.intent.llm_timeout()));
        let extractor = Arc::new(ParameterExtractor::new(registry.clone()));
        let questions = match &backend {
            Some(b) if config.lifecycle.llm_clarification_questions => {
                QuestionWriter::with_llm(b.clone(), cache.clone(), config.intent.llm_timeout())
            }
            _ => QuestionWriter::fixed(),
        };

        Self {
            router: ConfidenceRouter::new(classifier, registry.clone(), &config.intent),
            lifecycle: ToolLifecycleManager::new(
                extractor.clone(),
                events.clone(),
                &config.lifecycle,
            )
            .with_questions(questions),
            model: backend.as_ref().map(|b| b.model().to_string()),
            responder: ConversationalResponder::new(backend, cache.clone()),
            extractor,
            registry,
            cache,
            llm_timeout: config.intent.llm_timeout(),
            events,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Default tool set, LRU cache and Ollama backend from `config`.
    pub fn from_config(config: &AssistantConfig) -> Result<Self, LlmError> {
        let registry = Arc::new(ToolRegistry::with_defaults());
        let cache: Arc<dyn ResponseCache> = Arc::new(LruResponseCache::from_config(&config.intent));
        let backend: Option<Arc<dyn LlmBackend>> = if config.llm.enabled {
            Some(Arc::new(OllamaBackend::new(config.llm.clone())?))
        } else {
            None
        };
        Ok(Self::new(config, registry, backend, cache))
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Current routing configuration, cache occupancy and load.
    pub fn status(&self) -> AssistantStatus {
        let (high, low) = self.router.thresholds();
        AssistantStatus {
            llm_available: self.model.is_some(),
            classification_enabled: self.router.llm_enabled(),
            model: self.model.clone(),
            confidence_threshold_high: high,
            confidence_threshold_low: low,
            llm_timeout_ms: self.llm_timeout.as_millis() as u64,
            cache: self.cache.stats(),
            conversations: self.conversation_count(),
            tools: self.registry.len(),
        }
    }

    /// Forget every cached classification, reply and question.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Switch LLM classification on or off without a restart. Returns
    /// whether it is active afterwards.
    pub fn set_classification_enabled(&self, enabled: bool) -> bool {
        self.router.set_llm_enabled(enabled)
    }

    /// Progress events for every conversation.
    pub fn subscribe(&self) -> broadcast::Receiver<AssistantEvent> {
        self.events.subscribe()
    }

    /// Handle one user message and return the replies it produced, in order.
    ///
    /// A cancellation phrase that arrives while a tool is running in another
    /// turn returns no replies: that turn reports the cancelled result.
    pub async fn handle_message(&self, conversation_id: &str, text: &str) -> Vec<AssistantReply> {
        if let Err(reason) = validate(text) {
            tracing::debug!(conversation_id, reason, "message rejected");
            return vec![AssistantReply::invalid_input(conversation_id, reason)];
        }

        let slot = self.slot(conversation_id);
        let mut guard = match slot.conversation.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                // a turn is in flight; a cancellation must not wait for it
                if is_cancellation(text)
                    && let Some(handle) = slot.active()
                {
                    tracing::info!(
                        conversation_id,
                        session_id = %handle.session_id(),
                        "cancellation requested while a tool is running"
                    );
                    handle.trigger();
                    return Vec::new();
                }
                slot.conversation.lock().await
            }
        };
        let conv = &mut *guard;
        let mut replies = Vec::new();

        if let Some(session) = conv.session.take() {
            let step = self.lifecycle.handle_reply(session, text).await;
            self.drive(conversation_id, &slot, conv, Some(step), &mut replies)
                .await;
        } else {
            let intent = self
                .router
                .route(text, &conv.context.classification_context())
                .await;
            self.emit_intent(conversation_id, &intent);

            if intent.is_actionable() && self.registry.for_category(intent.category).is_some() {
                let mut intent = intent;
                let secondary = std::mem::take(&mut intent.secondary_intents);
                conv.queued.push_back((intent, text.to_string()));
                conv.queued
                    .extend(secondary.into_iter().map(|i| (i, text.to_string())));
                self.drive(conversation_id, &slot, conv, None, &mut replies)
                    .await;
            }
            if replies.is_empty() {
                let answer = self.responder.reply(text, &conv.context).await;
                replies.push(AssistantReply::conversational(conversation_id, answer));
            }
        }

        conv.context.record_user(text);
        for reply in &replies {
            conv.context.record_assistant(&reply.text);
        }
        replies
    }

    /// Cancel the conversation's active tool session, if any.
    ///
    /// Returns the cancellation reply when this call ended the session. A
    /// session that was executing inside an in-flight turn is reported by
    /// that turn instead, and `None` is returned here.
    pub async fn cancel(&self, conversation_id: &str) -> Option<AssistantReply> {
        let slot = self.existing_slot(conversation_id)?;
        let handle = slot.active()?;
        handle.trigger();

        let mut guard = slot.conversation.lock().await;
        let conv = &mut *guard;
        let session = conv
            .session
            .take_if(|s| s.id() == handle.session_id())?;
        slot.set_active(None);
        conv.queued.clear();

        match self.lifecycle.cancel(session, "cancel requested") {
            Ok(outcome) => {
                let reply = outcome_reply(conversation_id, outcome);
                conv.context.record_assistant(&reply.text);
                Some(reply)
            }
            Err(e) => {
                tracing::error!(error = %e, conversation_id, "failed to cancel session");
                None
            }
        }
    }

    /// The conversation's session waiting for input, if any.
    pub async fn session_snapshot(&self, conversation_id: &str) -> Option<SessionSnapshot> {
        let slot = self.existing_slot(conversation_id)?;
        let conv = slot.conversation.lock().await;
        conv.session.as_ref().map(ToolSession::snapshot)
    }

    /// Run queued intents (and an optional step already in progress) until a
    /// session needs the user or the queue is empty.
    async fn drive(
        &self,
        conversation_id: &str,
        slot: &Slot,
        conv: &mut Conversation,
        mut pending: Option<Result<Step, LifecycleError>>,
        replies: &mut Vec<AssistantReply>,
    ) {
        loop {
            let step = match pending.take() {
                Some(step) => step,
                None => {
                    let Some((intent, utterance)) = conv.queued.pop_front() else {
                        return;
                    };
                    let Some(extraction) = self.extractor.extract(&intent, &utterance, &conv.context)
                    else {
                        tracing::debug!(category = %intent.category, "no tool for queued intent");
                        continue;
                    };
                    match self.lifecycle.begin(conversation_id, extraction) {
                        Ok(session) => {
                            slot.set_active(Some(session.cancel_handle()));
                            self.lifecycle.advance(session).await
                        }
                        Err(e) => Err(e),
                    }
                }
            };

            match step {
                Ok(Step::AwaitingInput {
                    session,
                    kind,
                    message,
                }) => {
                    replies.push(prompt_reply(conversation_id, &session, kind, message));
                    conv.session = Some(session);
                    return;
                }
                Ok(Step::Finished(outcome)) => {
                    slot.set_active(None);
                    match outcome.result.status {
                        ToolStatus::Completed => {
                            conv.context.record_tool(outcome.category, &outcome.parameters)
                        }
                        ToolStatus::Cancelled if !conv.queued.is_empty() => {
                            tracing::info!(
                                conversation_id,
                                dropped = conv.queued.len(),
                                "dropping queued intents after cancellation"
                            );
                            conv.queued.clear();
                        }
                        _ => {}
                    }
                    replies.push(outcome_reply(conversation_id, outcome));
                }
                Err(e) => {
                    tracing::error!(error = %e, conversation_id, "tool session failed");
                    slot.set_active(None);
                    replies.push(AssistantReply::conversational(
                        conversation_id,
                        INTERNAL_ERROR_REPLY,
                    ));
                }
            }
        }
    }

    fn emit_intent(&self, conversation_id: &str, intent: &Intent) {
        let _ = self.events.send(AssistantEvent::IntentDetected {
            conversation_id: conversation_id.to_string(),
            category: intent.category,
            confidence: intent.confidence,
            detection_method: intent.detection_method,
            tool_name: self
                .registry
                .for_category(intent.category)
                .map(|t| t.name().to_string()),
            secondary: intent.secondary_intents.iter().map(|i| i.category).collect(),
            timestamp: Utc::now(),
        });
    }

    /// Number of conversations currently held in memory.
    pub fn conversation_count(&self) -> usize {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Get or create the slot for `conversation_id`, evicting idle ones.
    fn slot(&self, conversation_id: &str) -> Arc<Slot> {
        let mut conversations = self
            .conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let before = conversations.len();
        conversations.retain(|id, slot| {
            id == conversation_id
                || Arc::strong_count(slot) > 1
                || !slot.is_idle(CONVERSATION_IDLE_TTL)
        });
        let evicted = before - conversations.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = conversations.len(), "evicted idle conversations");
        }

        let slot = conversations
            .entry(conversation_id.to_string())
            .or_default()
            .clone();
        slot.touch();
        slot
    }

    fn existing_slot(&self, conversation_id: &str) -> Option<Arc<Slot>> {
        self.conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(conversation_id)
            .cloned()
    }
}

/// Reject empty and over-long utterances with the user-facing reason.
pub fn validate(text: &str) -> Result<(), &'static str> {
    if text.trim().is_empty() {
        return Err("Il messaggio è vuoto.");
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err("Il messaggio è troppo lungo (massimo 5000 caratteri).");
    }
    Ok(())
}

fn prompt_reply(
    conversation_id: &str,
    session: &ToolSession,
    kind: ReplyKind,
    message: String,
) -> AssistantReply {
    AssistantReply {
        conversation_id: conversation_id.to_string(),
        kind,
        text: message,
        tool_name: Some(session.tool_name().to_string()),
        state: Some(session.state()),
        missing_required: session.missing().to_vec(),
        tool_result: None,
    }
}

fn outcome_reply(conversation_id: &str, outcome: Outcome) -> AssistantReply {
    AssistantReply {
        conversation_id: conversation_id.to_string(),
        kind: ReplyKind::ToolResult,
        text: outcome.message,
        tool_name: Some(outcome.result.tool_name.clone()),
        state: Some(outcome.result.status.terminal_state()),
        missing_required: Vec::new(),
        tool_result: Some(outcome.result),
    }
}
