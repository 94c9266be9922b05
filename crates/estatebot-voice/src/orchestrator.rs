//! Response orchestrator: one finalized utterance in, reply text out.

use crate::config::SessionTuning;
use crate::engine::ConversationEngine;
use crate::error::VoiceError;
use crate::history::HistoryStore;
use estatebot_types::{HistoryWindow, Role};
use std::sync::Arc;

/// Persists turns and asks the conversational engine for a reply.
///
/// Every step of a call runs sequentially. Failures never escape: the caller
/// always receives text to speak, the fixed fallback reply when anything
/// went wrong.
pub struct ResponseOrchestrator {
    history: Arc<dyn HistoryStore>,
    engine: Arc<dyn ConversationEngine>,
    config_id: String,
    window: usize,
    fallback_reply: String,
}

impl ResponseOrchestrator {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        engine: Arc<dyn ConversationEngine>,
        config_id: impl Into<String>,
        tuning: &SessionTuning,
    ) -> Self {
        Self {
            history,
            engine,
            config_id: config_id.into(),
            window: tuning.history_window.max(1),
            fallback_reply: tuning.fallback_reply.clone(),
        }
    }

    pub fn fallback_reply(&self) -> &str {
        &self.fallback_reply
    }

    /// Produces the reply to speak for `utterance`.
    pub async fn respond(&self, utterance: &str, user_id: &str, session_id: &str) -> String {
        let mut user_turn_persisted = false;
        match self
            .generate_reply(utterance, user_id, session_id, &mut user_turn_persisted)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(
                    user_id,
                    session_id,
                    utterance,
                    error = %e,
                    "failed to generate reply, using fallback"
                );
                // Keep the partition alternating: a stored user turn always
                // gets an assistant turn after it.
                if user_turn_persisted {
                    if let Err(e) = self
                        .history
                        .append(user_id, session_id, Role::Assistant, &self.fallback_reply)
                        .await
                    {
                        tracing::warn!(error = %e, "failed to persist fallback reply");
                    }
                }
                self.fallback_reply.clone()
            }
        }
    }

    async fn generate_reply(
        &self,
        utterance: &str,
        user_id: &str,
        session_id: &str,
        user_turn_persisted: &mut bool,
    ) -> Result<String, VoiceError> {
        let user_turn = self
            .history
            .append(user_id, session_id, Role::User, utterance)
            .await?;
        *user_turn_persisted = true;

        // The fresh user turn is the newest row; fetch one extra and drop it
        // so the window holds `window - 1` turns that precede it.
        let limit = u32::try_from(self.window).unwrap_or(u32::MAX);
        let prior: Vec<_> = self
            .history
            .list_recent(user_id, session_id, limit)
            .await?
            .into_iter()
            .filter(|turn| turn.id < user_turn.id)
            .collect();

        let window = HistoryWindow::build(prior, utterance, self.window);
        tracing::debug!(
            user_id,
            session_id,
            window = window.len(),
            "requesting reply from conversational engine"
        );

        let reply = self.engine.generate(&self.config_id, &window).await?;

        self.history
            .append(user_id, session_id, Role::Assistant, &reply.text)
            .await?;
        Ok(reply.text)
    }
}
