//! Session configuration for the voice bridge.
//!
//! Everything a session needs (credentials, engine identifiers, pacing
//! constants) is collected into one `BridgeConfig`, built once at startup and
//! handed to each component. Secrets are redacted from `Debug` output.

use crate::error::VoiceError;
use chrono::{DateTime, Utc};
use estatebot_types::DEFAULT_HISTORY_WINDOW;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

fn default_token_ttl_seconds() -> u64 {
    3600
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LiveKitConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing)]
    pub api_secret: String,
    /// JWT token TTL in seconds for the bridge's own join token. Default: 3600.
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
}

impl Default for LiveKitConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

impl fmt::Debug for LiveKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveKitConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

impl LiveKitConfig {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

fn default_stt_model() -> String {
    "nova-3".to_string()
}

fn default_tts_model() -> String {
    "aura-2-andromeda-en".to_string()
}

fn default_tts_encoding() -> String {
    "linear16".to_string()
}

fn default_sample_rate() -> u32 {
    24_000
}

fn default_input_sample_rate() -> u32 {
    48_000
}

fn default_listen_url() -> String {
    "wss://api.deepgram.com/v1/listen".to_string()
}

fn default_speak_url() -> String {
    "https://api.deepgram.com/v1/speak".to_string()
}

/// Speech engine settings. One API key serves both recognition and synthesis.
#[derive(Clone, Serialize, Deserialize)]
pub struct DeepgramConfig {
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_stt_model")]
    pub stt_model: String,
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
    #[serde(default = "default_tts_encoding")]
    pub tts_encoding: String,
    /// Sample rate of synthesized audio and of the outbound track.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Rate inbound room audio is delivered at and recognized with.
    #[serde(default = "default_input_sample_rate")]
    pub input_sample_rate: u32,
    #[serde(default = "default_listen_url")]
    pub listen_url: String,
    #[serde(default = "default_speak_url")]
    pub speak_url: String,
}

impl Default for DeepgramConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            stt_model: default_stt_model(),
            tts_model: default_tts_model(),
            tts_encoding: default_tts_encoding(),
            sample_rate: default_sample_rate(),
            input_sample_rate: default_input_sample_rate(),
            listen_url: default_listen_url(),
            speak_url: default_speak_url(),
        }
    }
}

impl fmt::Debug for DeepgramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepgramConfig")
            .field("api_key", &"[REDACTED]")
            .field("stt_model", &self.stt_model)
            .field("tts_model", &self.tts_model)
            .field("tts_encoding", &self.tts_encoding)
            .field("sample_rate", &self.sample_rate)
            .field("input_sample_rate", &self.input_sample_rate)
            .field("listen_url", &self.listen_url)
            .field("speak_url", &self.speak_url)
            .finish()
    }
}

fn default_project() -> String {
    "Krupal Habitat".to_string()
}

fn default_engine_timeout_secs() -> u64 {
    30
}

/// Where the retrieval-augmented conversational engine lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub url: String,
    /// Fixed configuration identifier passed on every voice-session call.
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default = "default_engine_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            project: default_project(),
            timeout_secs: default_engine_timeout_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    10
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

/// Startup retry policy. Fixed delay, no backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

fn default_history_window() -> usize {
    DEFAULT_HISTORY_WINDOW
}

fn default_fallback_reply() -> String {
    "Sorry, I couldn't answer that.".to_string()
}

fn default_track_name() -> String {
    "bot-tts".to_string()
}

fn default_frame_channel_capacity() -> usize {
    64
}

fn default_transcript_channel_capacity() -> usize {
    32
}

fn default_drain_timeout_ms() -> u64 {
    5_000
}

/// Complete configuration of one bridge process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub livekit: LiveKitConfig,
    #[serde(default)]
    pub deepgram: DeepgramConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub session: SessionTuning,
}

/// Per-session pacing and buffering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTuning {
    /// Entries handed to the engine, current utterance included.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Spoken in place of a real answer when a turn fails.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
    /// Name of the outbound audio track.
    #[serde(default = "default_track_name")]
    pub track_name: String,
    /// Frames buffered between the ingest pump and the recognizer.
    #[serde(default = "default_frame_channel_capacity")]
    pub frame_channel_capacity: usize,
    /// Recognizer events buffered ahead of the aggregator.
    #[serde(default = "default_transcript_channel_capacity")]
    pub transcript_channel_capacity: usize,
    /// Grace period for an in-flight reply after the room closes.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            fallback_reply: default_fallback_reply(),
            track_name: default_track_name(),
            frame_channel_capacity: default_frame_channel_capacity(),
            transcript_channel_capacity: default_transcript_channel_capacity(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl SessionTuning {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl BridgeConfig {
    /// Rejects configurations the bridge cannot start with.
    ///
    /// Missing credentials are fatal and never retried.
    pub fn validate(&self) -> Result<(), VoiceError> {
        if self.livekit.url.trim().is_empty() {
            return Err(VoiceError::MissingCredential("LIVEKIT_URL"));
        }
        if self.livekit.api_key.trim().is_empty() {
            return Err(VoiceError::MissingCredential("LIVEKIT_API_KEY"));
        }
        if self.livekit.api_secret.trim().is_empty() {
            return Err(VoiceError::MissingCredential("LIVEKIT_API_SECRET"));
        }
        if self.deepgram.api_key.trim().is_empty() {
            return Err(VoiceError::MissingCredential("DEEPGRAM_API_KEY"));
        }
        if self.engine.url.trim().is_empty() {
            return Err(VoiceError::MissingCredential("ENGINE_URL"));
        }
        if self.session.history_window == 0 {
            return Err(VoiceError::Config(
                "session.history_window must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(VoiceError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.session.frame_channel_capacity == 0
            || self.session.transcript_channel_capacity == 0
        {
            return Err(VoiceError::Config(
                "channel capacities must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// One live voice conversation: who the bridge talks to, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub room: String,
    /// Identity of the remote human participant.
    pub participant_identity: String,
    pub user_id: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        room: impl Into<String>,
        participant_identity: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            room: room.into(),
            participant_identity: participant_identity.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            created_at: Utc::now(),
        }
    }

    /// Reads the session identifiers from the process environment.
    pub fn from_env() -> Result<Self, VoiceError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like `from_env`, with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, VoiceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, VoiceError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(VoiceError::MissingCredential(key))
        };

        Ok(Self::new(
            required("ROOM_NAME")?,
            required("PARTICIPANT_IDENTITY")?,
            required("USER_ID")?,
            required("SESSION_ID")?,
        ))
    }

    /// Identity the bridge itself joins the room under.
    pub fn agent_identity(&self) -> String {
        format!("{}-agent", self.participant_identity)
    }
}
