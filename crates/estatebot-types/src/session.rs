//! Lifecycle states of a voice bridge session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `Init -> Connected -> AudioSeen -> Listening <-> Responding -> Closed`.
///
/// `Closed` is terminal and reachable from every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Init,
    /// Joined the room, no inbound audio yet. Outbound publish is blocked.
    Connected,
    /// First inbound audio track observed. One-shot.
    AudioSeen,
    Listening,
    Responding,
    Closed,
}

impl SessionState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Init, Connected) => true,
            (Connected, AudioSeen) => true,
            (AudioSeen, Listening) => true,
            (Listening, Responding) | (Responding, Listening) => true,
            _ => false,
        }
    }

    /// True once the outbound track may be published.
    pub fn audio_seen(self) -> bool {
        matches!(self, Self::AudioSeen | Self::Listening | Self::Responding)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Init => "init",
            Self::Connected => "connected",
            Self::AudioSeen => "audio_seen",
            Self::Listening => "listening",
            Self::Responding => "responding",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}
