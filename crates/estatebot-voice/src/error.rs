use thiserror::Error;

/// Stable classification of media-transport failures.
///
/// The startup supervisor branches on this, never on the shape of a
/// third-party error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The remote participant (or the room) does not exist yet.
    ParticipantNotFound,
    /// Credentials were rejected.
    Unauthorized,
    /// The media server could not be reached.
    Unreachable,
    /// The outbound track could not be published.
    Publish,
    Other,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn participant_not_found(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ParticipantNotFound, message)
    }
}

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("LiveKit token error: {0}")]
    LiveKit(#[from] livekit_api::access_token::AccessTokenError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("missing required credential or identifier: {0}")]
    MissingCredential(&'static str),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("STT error: {0}")]
    Stt(String),

    #[error("conversational engine error: {0}")]
    Engine(String),

    #[error("history store error: {0}")]
    History(String),

    #[error("participant never joined after {attempts} attempts")]
    ParticipantNeverJoined { attempts: u32 },
}

impl VoiceError {
    /// Only the participant-not-yet-present race is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(TransportError {
                kind: TransportErrorKind::ParticipantNotFound,
                ..
            })
        )
    }
}

impl From<estatebot_db::HistoryError> for VoiceError {
    fn from(err: estatebot_db::HistoryError) -> Self {
        Self::History(err.to_string())
    }
}
