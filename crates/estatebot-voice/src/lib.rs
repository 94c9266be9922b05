//! Real-time voice bridge for the estatebot sales assistant.
//!
//! One bridge process serves one room: it joins as `<participant>-agent`,
//! waits for the remote participant's microphone, relays that audio to a
//! streaming recognizer, and answers each finalized utterance with a
//! synthesized reply on its own published track.
//!
//! The pipeline is a handful of tokio tasks joined by bounded channels:
//! the audio pump forwards frames into the recognizer, and the transcript
//! aggregator handles finalized utterances strictly one at a time through
//! the response orchestrator and the synthesis emitter. The session
//! controller owns the room event loop and teardown. External services sit
//! behind traits (`MediaTransport`, `SpeechToText`, `SpeechSynthesizer`,
//! `ConversationEngine`, `HistoryStore`) so the pipeline runs against fakes
//! in tests.
//!
//! The LiveKit WebRTC transport is behind the `livekit-rtc` feature.

pub mod aggregator;
pub mod config;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod history;
#[cfg(feature = "livekit-rtc")]
pub mod livekit_room;
pub mod orchestrator;
pub mod pump;
pub mod retry;
pub mod service;
pub mod session;
pub mod stt;
pub mod transport;
pub mod tts;

pub use aggregator::TranscriptAggregator;
pub use config::{
    BridgeConfig, DeepgramConfig, EngineConfig, LiveKitConfig, RetryConfig, Session, SessionTuning,
};
pub use emitter::SynthesisEmitter;
pub use engine::{ConversationEngine, EngineReply, HttpConversationEngine};
pub use error::{TransportError, TransportErrorKind, VoiceError};
pub use history::{HistoryStore, SqliteHistoryStore};
#[cfg(feature = "livekit-rtc")]
pub use livekit_room::LiveKitTransport;
pub use orchestrator::ResponseOrchestrator;
pub use pump::pump_audio;
pub use retry::{RetryState, StartupSupervisor};
pub use service::VoiceService;
pub use session::{SessionController, SessionReport, StateTracker};
pub use stt::{DeepgramStt, SpeechToText, SttStream, TranscriptResult};
pub use transport::{
    AudioSink, MediaTransport, RemoteTrack, RoomConnection, RoomEvent, RoomHandle, TrackKind,
};
pub use tts::{AudioChunkStream, DeepgramTts, SpeechSynthesizer};
