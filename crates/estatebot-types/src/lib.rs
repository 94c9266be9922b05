//! Shared types for the estatebot platform.
//!
//! This crate holds the plain data model used by the persistence layer and
//! the voice bridge: conversation turns and their roles, recognizer
//! transcript events, PCM audio frames, the bounded history window handed to
//! the conversational engine, and the per-session lifecycle states.
//!
//! Nothing in here performs I/O. Every other crate in the workspace depends
//! on `estatebot-types` for cross-cutting definitions so the dependency graph
//! stays acyclic.

pub mod audio;
pub mod history;
pub mod session;

pub use audio::AudioFrame;
pub use history::{HistoryEntry, HistoryWindow, DEFAULT_HISTORY_WINDOW};
pub use session::SessionState;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human on the other end of the session.
    User,
    /// The bot. Older rows persisted by the text endpoint use `ai`.
    #[serde(alias = "ai")]
    Assistant,
}

impl Role {
    /// Returns the string stored in the database and sent to the engine.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored role string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown conversation role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" | "ai" => Ok(Self::Assistant),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// A persisted conversation turn. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Store-assigned sequence number. Strictly increasing within a partition.
    pub id: i64,
    pub user_id: String,
    pub session_id: String,
    pub role: Role,
    pub text: String,
    /// Creation timestamp (ISO 8601, UTC).
    pub created_at: String,
}

/// Whether a recognizer hypothesis is still provisional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptKind {
    Partial,
    Final,
}

/// A single event from the speech recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub kind: TranscriptKind,
    pub text: String,
}

impl TranscriptEvent {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            kind: TranscriptKind::Partial,
            text: text.into(),
        }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            kind: TranscriptKind::Final,
            text: text.into(),
        }
    }

    /// Returns the trimmed utterance if this event is final and non-blank.
    pub fn actionable_text(&self) -> Option<&str> {
        if self.kind != TranscriptKind::Final {
            return None;
        }
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }
}
