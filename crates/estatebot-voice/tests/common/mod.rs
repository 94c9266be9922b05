#![allow(dead_code)]

use async_trait::async_trait;
use estatebot_db::{open_database, DbRuntimeSettings};
use estatebot_types::{AudioFrame, HistoryEntry, HistoryWindow, TranscriptEvent};
use estatebot_voice::{
    AudioChunkStream, AudioSink, ConversationEngine, EngineReply, MediaTransport,
    ResponseOrchestrator, RoomConnection, RoomEvent, RoomHandle, Session, SessionController,
    SessionTuning, SpeechSynthesizer, SpeechToText, SqliteHistoryStore, SttStream, TransportError,
    TransportErrorKind, TranscriptResult, VoiceError,
};
use futures_util::stream::{self, BoxStream, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub const PARTICIPANT: &str = "buyer-42";

pub fn session() -> Session {
    Session::new("room-1", PARTICIPANT, "user-1", "session-1")
}

pub fn frame(marker: i16) -> AudioFrame {
    AudioFrame::new(vec![marker; 480], 48_000, 1)
}

/// Inbound frames fed by the test; the track ends when the sender drops.
pub fn live_frames() -> (mpsc::Sender<AudioFrame>, BoxStream<'static, AudioFrame>) {
    let (tx, rx) = mpsc::channel(16);
    (tx, ReceiverStream::new(rx).boxed())
}

pub fn finite_frames(count: i16) -> BoxStream<'static, AudioFrame> {
    stream::iter((0..count).map(frame)).boxed()
}

// ---------------------------------------------------------------------------
// Media transport
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct SinkLog {
    pub frames: Mutex<Vec<AudioFrame>>,
}

#[async_trait]
impl AudioSink for SinkLog {
    async fn capture_frame(&self, frame: AudioFrame) -> Result<(), TransportError> {
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }
}

#[derive(Default)]
pub struct RoomLog {
    pub published: Mutex<Vec<(String, u32)>>,
    pub disconnected: AtomicBool,
    pub sink: Arc<SinkLog>,
    pub fail_publish: AtomicBool,
}

impl RoomLog {
    pub fn published_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn played(&self) -> Vec<AudioFrame> {
        self.sink.frames.lock().unwrap().clone()
    }
}

struct FakeRoom {
    log: Arc<RoomLog>,
}

#[async_trait]
impl RoomHandle for FakeRoom {
    async fn publish_audio_track(
        &self,
        name: &str,
        sample_rate: u32,
        _num_channels: u32,
    ) -> Result<Arc<dyn AudioSink>, TransportError> {
        if self.log.fail_publish.load(Ordering::SeqCst) {
            return Err(TransportError::new(TransportErrorKind::Publish, "publish rejected"));
        }
        self.log
            .published
            .lock()
            .unwrap()
            .push((name.to_string(), sample_rate));
        Ok(self.log.sink.clone())
    }

    async fn disconnect(&self) {
        self.log.disconnected.store(true, Ordering::SeqCst);
    }
}

/// Hands out one pre-built room. The first `not_found` connects fail with
/// `ParticipantNotFound`.
pub struct FakeTransport {
    connection: Mutex<Option<RoomConnection>>,
    not_found: AtomicU32,
    pub connects: AtomicU32,
    pub log: Arc<RoomLog>,
}

impl FakeTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<RoomEvent>) {
        let (tx, events) = mpsc::unbounded_channel();
        let log = Arc::new(RoomLog::default());
        let transport = Self {
            connection: Mutex::new(Some(RoomConnection {
                room: Box::new(FakeRoom { log: log.clone() }),
                events,
            })),
            not_found: AtomicU32::new(0),
            connects: AtomicU32::new(0),
            log,
        };
        (Arc::new(transport), tx)
    }

    pub fn fail_first(self: &Arc<Self>, attempts: u32) {
        self.not_found.store(attempts, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaTransport for FakeTransport {
    async fn connect(&self, _session: &Session) -> Result<RoomConnection, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let remaining = self.not_found.load(Ordering::SeqCst);
        if remaining > 0 {
            self.not_found.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::participant_not_found("participant not found"));
        }
        self.connection
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| TransportError::new(TransportErrorKind::Other, "already connected"))
    }
}

// ---------------------------------------------------------------------------
// Speech recognition
// ---------------------------------------------------------------------------

/// Emits `event` once `after_frames` frames have been received. Anything
/// not yet emitted is flushed when the input closes, then the event stream
/// ends.
pub struct ScriptedStt {
    script: Mutex<Vec<(usize, TranscriptResult)>>,
    pub received: Arc<AtomicUsize>,
}

impl ScriptedStt {
    pub fn new(script: Vec<(usize, TranscriptResult)>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            received: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn finals(texts: &[&str]) -> Arc<Self> {
        Self::new(
            texts
                .iter()
                .map(|t| (1, Ok(TranscriptEvent::final_text(*t))))
                .collect(),
        )
    }
}

#[async_trait]
impl SpeechToText for ScriptedStt {
    async fn stream(&self) -> Result<SttStream, VoiceError> {
        let mut script = std::mem::take(&mut *self.script.lock().unwrap());
        let received = self.received.clone();
        let (input, mut input_rx) = mpsc::channel::<AudioFrame>(4);
        let (event_tx, events) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut count = 0usize;
            while input_rx.recv().await.is_some() {
                count += 1;
                received.store(count, Ordering::SeqCst);
                while script.first().is_some_and(|(after, _)| *after <= count) {
                    let (_, event) = script.remove(0);
                    if event_tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
            for (_, event) in script {
                if event_tx.send(event).await.is_err() {
                    return;
                }
            }
        });

        Ok(SttStream { input, events })
    }
}

// ---------------------------------------------------------------------------
// Speech synthesis
// ---------------------------------------------------------------------------

/// Two frames per reply, tagged `[reply_index, chunk_index]`.
#[derive(Default)]
pub struct FakeTts {
    pub texts: Mutex<Vec<String>>,
    pub fail_on: Mutex<Option<String>>,
}

impl FakeTts {
    pub fn failing_on(text: &str) -> Arc<Self> {
        let tts = Self::default();
        *tts.fail_on.lock().unwrap() = Some(text.to_string());
        Arc::new(tts)
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeTts {
    async fn synthesize(&self, text: &str) -> Result<AudioChunkStream, VoiceError> {
        let index = {
            let mut texts = self.texts.lock().unwrap();
            texts.push(text.to_string());
            (texts.len() - 1) as i16
        };
        if self.fail_on.lock().unwrap().as_deref() == Some(text) {
            return Err(VoiceError::Tts("synthesis unavailable".to_string()));
        }
        let chunks = (0..2).map(move |chunk| Ok(AudioFrame::new(vec![index, chunk], 24_000, 1)));
        Ok(stream::iter(chunks).boxed())
    }
}

// ---------------------------------------------------------------------------
// Conversational engine
// ---------------------------------------------------------------------------

/// Answers `"answer: <utterance>"`, or the fixed `reply` when set, after
/// `delay`. Records every window and the highest number of overlapping calls.
#[derive(Default)]
pub struct FakeEngine {
    pub windows: Mutex<Vec<Vec<HistoryEntry>>>,
    pub config_ids: Mutex<Vec<String>>,
    pub fail_on: Mutex<Option<String>>,
    pub delay: Duration,
    pub reply: Option<String>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeEngine {
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(text.to_string()),
            ..Self::default()
        })
    }

    pub fn failing_on(text: &str) -> Arc<Self> {
        let engine = Self::default();
        *engine.fail_on.lock().unwrap() = Some(text.to_string());
        Arc::new(engine)
    }

    pub fn windows(&self) -> Vec<Vec<HistoryEntry>> {
        self.windows.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConversationEngine for FakeEngine {
    async fn generate(
        &self,
        config_id: &str,
        history: &HistoryWindow,
    ) -> Result<EngineReply, VoiceError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.windows
            .lock()
            .unwrap()
            .push(history.entries().to_vec());
        self.config_ids.lock().unwrap().push(config_id.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let utterance = history
            .current()
            .map(|entry| entry.content.clone())
            .unwrap_or_default();
        if self.fail_on.lock().unwrap().as_deref() == Some(utterance.as_str()) {
            return Err(VoiceError::Engine("engine returned 500".to_string()));
        }
        Ok(EngineReply {
            text: self
                .reply
                .clone()
                .unwrap_or_else(|| format!("answer: {utterance}")),
            image_url: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub fn history_store() -> (Arc<SqliteHistoryStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.db");
    let pool = open_database(path.to_str().unwrap(), DbRuntimeSettings::default()).unwrap();
    (Arc::new(SqliteHistoryStore::new(pool)), dir)
}

pub struct Harness {
    pub controller: Arc<SessionController>,
    pub transport: Arc<FakeTransport>,
    pub events: mpsc::UnboundedSender<RoomEvent>,
    pub history: Arc<SqliteHistoryStore>,
    pub _dir: tempfile::TempDir,
}

pub fn harness(
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn SpeechSynthesizer>,
    engine: Arc<dyn ConversationEngine>,
) -> Harness {
    let (transport, events) = FakeTransport::new();
    let (history, dir) = history_store();
    let tuning = SessionTuning::default();
    let orchestrator = Arc::new(ResponseOrchestrator::new(
        history.clone(),
        engine,
        "Krupal Habitat",
        &tuning,
    ));
    let controller = Arc::new(SessionController::new(
        transport.clone(),
        stt,
        tts,
        orchestrator,
        history.clone(),
        tuning,
        24_000,
    ));
    Harness {
        controller,
        transport,
        events,
        history,
        _dir: dir,
    }
}
