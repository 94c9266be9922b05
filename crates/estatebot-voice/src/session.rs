//! Session controller: one room, one remote speaker, one bot track.

use crate::aggregator::TranscriptAggregator;
use crate::config::{Session, SessionTuning};
use crate::emitter::SynthesisEmitter;
use crate::error::{TransportError, TransportErrorKind, VoiceError};
use crate::history::HistoryStore;
use crate::orchestrator::ResponseOrchestrator;
use crate::pump::pump_audio;
use crate::stt::{SpeechToText, SttStream};
use crate::transport::{
    AudioSink, MediaTransport, RemoteTrack, RoomConnection, RoomEvent, RoomHandle, TrackKind,
};
use crate::tts::SpeechSynthesizer;
use estatebot_types::SessionState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Shared view of a session's lifecycle state.
///
/// Illegal transitions are rejected and logged; the state is left as is.
#[derive(Debug, Clone)]
pub struct StateTracker {
    tx: Arc<watch::Sender<SessionState>>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::Init);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> SessionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Moves to `next` if the lifecycle allows it. Returns whether it did.
    pub fn transition(&self, next: SessionState) -> bool {
        let mut from = None;
        let changed = self.tx.send_if_modified(|state| {
            if state.can_transition_to(next) {
                from = Some(*state);
                *state = next;
                true
            } else {
                false
            }
        });
        match from {
            Some(from) => tracing::debug!(%from, to = %next, "session state changed"),
            None => tracing::warn!(current = %self.current(), to = %next, "rejected session state transition"),
        }
        changed
    }

    fn reset(&self) {
        self.tx.send_replace(SessionState::Init);
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub frames_forwarded: u64,
    pub utterances_handled: u64,
    pub final_state: SessionState,
    /// Turns stored for this (user, session) partition at teardown.
    pub persisted_turns: usize,
}

/// Tasks started once the remote participant's audio shows up.
struct Pipeline {
    pump: JoinHandle<u64>,
    aggregator: JoinHandle<u64>,
    handled: Arc<AtomicU64>,
}

impl Pipeline {
    /// Waits for both tasks. The aggregator gets `drain` to finish a reply
    /// already in flight before it is abandoned. Utterances are counted from
    /// the shared counter, so completed cycles survive an abort.
    async fn shutdown(self, drain: Duration) -> (u64, u64) {
        let frames = match self.pump.await {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!(error = %e, "audio pump task failed");
                0
            }
        };

        let abort = self.aggregator.abort_handle();
        match tokio::time::timeout(drain, self.aggregator).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "transcript aggregator task failed"),
            Err(_) => {
                abort.abort();
                tracing::warn!(
                    drain_ms = drain.as_millis() as u64,
                    "reply still in flight at teardown, abandoning it"
                );
            }
        }
        (frames, self.handled.load(Ordering::Relaxed))
    }
}

/// Drives one bridge session from room join to teardown.
pub struct SessionController {
    transport: Arc<dyn MediaTransport>,
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn SpeechSynthesizer>,
    orchestrator: Arc<ResponseOrchestrator>,
    history: Arc<dyn HistoryStore>,
    tuning: SessionTuning,
    output_sample_rate: u32,
    state: StateTracker,
}

impl SessionController {
    pub fn new(
        transport: Arc<dyn MediaTransport>,
        stt: Arc<dyn SpeechToText>,
        tts: Arc<dyn SpeechSynthesizer>,
        orchestrator: Arc<ResponseOrchestrator>,
        history: Arc<dyn HistoryStore>,
        tuning: SessionTuning,
        output_sample_rate: u32,
    ) -> Self {
        Self {
            transport,
            stt,
            tts,
            orchestrator,
            history,
            tuning,
            output_sample_rate,
            state: StateTracker::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Joins the room and runs the session until the room disconnects, the
    /// remote audio ends, or the pipeline fails to start.
    ///
    /// A failed connect is returned as is and leaves the state at `Init`,
    /// so the call can be repeated.
    pub async fn start(&self, session: &Session) -> Result<SessionReport, VoiceError> {
        self.state.reset();
        let RoomConnection { room, mut events } = self.transport.connect(session).await?;
        self.state.transition(SessionState::Connected);
        tracing::info!(
            room = %session.room,
            participant = %session.participant_identity,
            session_id = %session.session_id,
            "joined room, waiting for participant audio"
        );

        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();
        let mut pipeline: Option<Pipeline> = None;
        let mut failure: Option<VoiceError> = None;

        loop {
            let event = tokio::select! {
                _ = finished.cancelled() => {
                    tracing::info!("participant audio ended, closing session");
                    break;
                }
                event = events.recv() => event,
            };

            match event {
                None => {
                    tracing::info!("room event stream closed");
                    break;
                }
                Some(RoomEvent::Disconnected { reason }) => {
                    tracing::info!(%reason, "room disconnected");
                    break;
                }
                Some(RoomEvent::ParticipantJoined { identity }) => {
                    tracing::info!(%identity, "participant joined");
                }
                Some(RoomEvent::TrackPublished {
                    participant,
                    sid,
                    kind,
                }) => {
                    tracing::debug!(%participant, %sid, ?kind, "track published");
                }
                Some(RoomEvent::TrackSubscribed { participant, track }) => {
                    if participant != session.participant_identity {
                        tracing::debug!(%participant, sid = %track.sid, "ignoring track from another participant");
                        continue;
                    }
                    if track.kind != TrackKind::Audio || pipeline.is_some() {
                        tracing::debug!(sid = %track.sid, kind = ?track.kind, "ignoring track");
                        continue;
                    }
                    match self
                        .start_pipeline(session, room.as_ref(), track, &cancel, &finished)
                        .await
                    {
                        Ok(started) => pipeline = Some(started),
                        Err(e) => {
                            tracing::error!(error = %e, "failed to start audio pipeline");
                            failure = Some(e);
                            break;
                        }
                    }
                }
            }
        }

        cancel.cancel();
        let (frames_forwarded, utterances_handled) = match pipeline {
            Some(pipeline) => pipeline.shutdown(self.tuning.drain_timeout()).await,
            None => (0, 0),
        };
        room.disconnect().await;
        self.state.transition(SessionState::Closed);

        let persisted_turns = match self
            .history
            .list_all(&session.user_id, &session.session_id)
            .await
        {
            Ok(turns) => turns.len(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read session transcript");
                0
            }
        };
        tracing::info!(
            session_id = %session.session_id,
            frames_forwarded,
            utterances_handled,
            persisted_turns,
            "session closed"
        );

        if let Some(e) = failure {
            return Err(e);
        }
        Ok(SessionReport {
            frames_forwarded,
            utterances_handled,
            final_state: self.state.current(),
            persisted_turns,
        })
    }

    async fn start_pipeline(
        &self,
        session: &Session,
        room: &dyn RoomHandle,
        track: RemoteTrack,
        cancel: &CancellationToken,
        finished: &CancellationToken,
    ) -> Result<Pipeline, VoiceError> {
        let Some(frames) = track.frames else {
            return Err(VoiceError::Transport(TransportError::new(
                TransportErrorKind::Other,
                format!("audio track {} carries no frames", track.sid),
            )));
        };

        let SttStream { input, events } = self.stt.stream().await?;
        let pump = tokio::spawn(pump_audio(frames, input, cancel.clone()));
        self.state.transition(SessionState::AudioSeen);
        tracing::info!(sid = %track.sid, "participant audio subscribed");

        let sink = match self.publish_outbound(room).await {
            Ok(sink) => sink,
            Err(e) => {
                cancel.cancel();
                pump.abort();
                return Err(e);
            }
        };
        self.state.transition(SessionState::Listening);

        let aggregator = TranscriptAggregator::new(
            self.orchestrator.clone(),
            SynthesisEmitter::new(self.tts.clone(), sink),
            session.user_id.clone(),
            session.session_id.clone(),
            self.state.clone(),
        );
        let counter = aggregator.handled_counter();
        let stop = cancel.clone();
        let done = finished.clone();
        let aggregator = tokio::spawn(async move {
            let handled = aggregator.run(events, stop).await;
            done.cancel();
            handled
        });

        Ok(Pipeline {
            pump,
            aggregator,
            handled: counter,
        })
    }

    async fn publish_outbound(
        &self,
        room: &dyn RoomHandle,
    ) -> Result<Arc<dyn AudioSink>, VoiceError> {
        if !self.state.current().audio_seen() {
            return Err(VoiceError::Transport(TransportError::new(
                TransportErrorKind::Publish,
                "outbound track requested before participant audio",
            )));
        }
        let sink = room
            .publish_audio_track(&self.tuning.track_name, self.output_sample_rate, 1)
            .await?;
        tracing::info!(track = %self.tuning.track_name, "published bot audio track");
        Ok(sink)
    }
}
