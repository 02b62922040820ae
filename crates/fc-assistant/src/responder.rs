//! Conversational replies for utterances with no tool intent.

use std::sync::Arc;

use serde_json::json;

use crate::cache::{CachedValue, Fingerprint, ResponseCache};
use crate::context::ConversationContext;
use crate::inference::prompts::{CONVERSATION_PROMPT, conversation_message};
use crate::inference::{CompletionRequest, LlmBackend};

/// Reply used whenever no model answer is available.
pub const UNAVAILABLE_REPLY: &str =
    "Mi dispiace, il sistema AI non è disponibile al momento. Riprova più tardi.";

pub struct ConversationalResponder {
    backend: Option<Arc<dyn LlmBackend>>,
    cache: Arc<dyn ResponseCache>,
}

impl ConversationalResponder {
    pub fn new(backend: Option<Arc<dyn LlmBackend>>, cache: Arc<dyn ResponseCache>) -> Self {
        Self { backend, cache }
    }

    /// Answer `text` given the conversation so far. Never fails.
    pub async fn reply(&self, text: &str, context: &ConversationContext) -> String {
        let Some(backend) = &self.backend else {
            return UNAVAILABLE_REPLY.to_string();
        };

        let history: Vec<_> = context.turns().collect();
        let key = Fingerprint::derive(
            text,
            &json!({ "conversation": history }),
            backend.model(),
        );
        if let Some(CachedValue::Reply(reply)) = self.cache.get(&key) {
            tracing::debug!(key = key.as_str(), "conversation cache hit");
            return reply;
        }

        let request = CompletionRequest::conversational(
            CONVERSATION_PROMPT,
            conversation_message(text, history.into_iter()),
        );
        match backend.complete(&request).await {
            Ok(reply) => {
                let reply = reply.trim().to_string();
                self.cache.put(key, CachedValue::Reply(reply.clone()));
                reply
            }
            Err(e) => {
                tracing::warn!(error = %e, "conversational reply failed");
                UNAVAILABLE_REPLY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LruResponseCache;
    use crate::inference::mock::{ScriptedBackend, ScriptedReply};
    use std::num::NonZeroUsize;
    use std::time::Duration;

    fn cache() -> Arc<LruResponseCache> {
        Arc::new(LruResponseCache::new(
            NonZeroUsize::new(8).unwrap(),
            Duration::from_secs(300),
        ))
    }

    #[tokio::test]
    async fn replies_and_caches() {
        let backend = Arc::new(
            ScriptedBackend::new("m").with_replies([ScriptedReply::text("  Ciao! Sono Frank. ")]),
        );
        let responder = ConversationalResponder::new(Some(backend.clone()), cache());
        let ctx = ConversationContext::default();

        assert_eq!(responder.reply("Ciao", &ctx).await, "Ciao! Sono Frank.");
        assert_eq!(responder.reply("ciao", &ctx).await, "Ciao! Sono Frank.");
        assert_eq!(backend.call_count(), 1);
        assert!(!backend.requests()[0].json);
    }

    #[tokio::test]
    async fn history_changes_the_key() {
        let backend = Arc::new(ScriptedBackend::new("m").always(ScriptedReply::text("ok")));
        let responder = ConversationalResponder::new(Some(backend.clone()), cache());
        let mut ctx = ConversationContext::default();

        responder.reply("Grazie", &ctx).await;
        ctx.record_user("Come ti chiami?");
        ctx.record_assistant("Frank.");
        responder.reply("Grazie", &ctx).await;

        assert_eq!(backend.call_count(), 2);
        assert!(backend.requests()[1].user.contains("Frank: Frank."));
    }

    #[tokio::test]
    async fn failure_uses_fixed_apology_and_is_not_cached() {
        let backend = Arc::new(ScriptedBackend::new("m").with_replies([
            ScriptedReply::Fail("down".into()),
            ScriptedReply::text("Eccomi"),
        ]));
        let responder = ConversationalResponder::new(Some(backend.clone()), cache());
        let ctx = ConversationContext::default();

        assert_eq!(responder.reply("Ciao", &ctx).await, UNAVAILABLE_REPLY);
        assert_eq!(responder.reply("Ciao", &ctx).await, "Eccomi");
    }

    #[tokio::test]
    async fn no_backend_apologizes() {
        let responder = ConversationalResponder::new(None, cache());
        let reply = responder.reply("Ciao", &ConversationContext::default()).await;
        assert_eq!(reply, UNAVAILABLE_REPLY);
    }
}
