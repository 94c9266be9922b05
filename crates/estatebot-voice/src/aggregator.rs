//! Transcript aggregation: finalized utterances become spoken replies.

use crate::emitter::SynthesisEmitter;
use crate::orchestrator::ResponseOrchestrator;
use crate::session::StateTracker;
use crate::stt::TranscriptResult;
use estatebot_types::SessionState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Consumes recognizer events for one session.
///
/// Utterances are handled strictly one at a time: the next event is not read
/// until the previous reply has been persisted and played. Events that
/// arrive meanwhile wait in the recognizer channel, in order.
pub struct TranscriptAggregator {
    orchestrator: Arc<ResponseOrchestrator>,
    emitter: SynthesisEmitter,
    user_id: String,
    session_id: String,
    state: StateTracker,
    handled: Arc<AtomicU64>,
}

impl TranscriptAggregator {
    pub fn new(
        orchestrator: Arc<ResponseOrchestrator>,
        emitter: SynthesisEmitter,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        state: StateTracker,
    ) -> Self {
        Self {
            orchestrator,
            emitter,
            user_id: user_id.into(),
            session_id: session_id.into(),
            state,
            handled: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared count of completed utterance cycles. Stays readable when the
    /// task running [`run`](Self::run) is aborted.
    pub fn handled_counter(&self) -> Arc<AtomicU64> {
        self.handled.clone()
    }

    /// Runs until the event stream ends, the recognizer fails, or `cancel`
    /// fires while idle. Returns the number of utterances handled.
    ///
    /// Cancellation is only observed between utterances so that a reply in
    /// flight is finished and persisted.
    pub async fn run(
        self,
        mut events: mpsc::Receiver<TranscriptResult>,
        cancel: CancellationToken,
    ) -> u64 {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };

            let event = match event {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    tracing::error!(error = %e, "speech recognition failed, ending transcript stream");
                    break;
                }
                None => {
                    tracing::debug!("transcript stream ended");
                    break;
                }
            };

            let Some(utterance) = event.actionable_text() else {
                continue;
            };
            let utterance = utterance.to_string();
            tracing::info!(
                user_id = %self.user_id,
                session_id = %self.session_id,
                utterance = %utterance,
                "final transcript"
            );

            self.state.transition(SessionState::Responding);
            let reply = self
                .orchestrator
                .respond(&utterance, &self.user_id, &self.session_id)
                .await;
            if let Err(e) = self.emitter.speak(&reply).await {
                tracing::warn!(error = %e, "failed to play reply");
            }
            self.state.transition(SessionState::Listening);
            self.handled.fetch_add(1, Ordering::Relaxed);
        }
        self.handled.load(Ordering::Relaxed)
    }
}
