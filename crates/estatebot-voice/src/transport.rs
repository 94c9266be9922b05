//! Media-transport boundary.
//!
//! A transport adapter joins a room and reports what happens in it as typed
//! `RoomEvent`s on a channel. The session controller consumes that channel
//! from a single loop; no callbacks are registered on the room.

use crate::config::Session;
use crate::error::TransportError;
use async_trait::async_trait;
use estatebot_types::AudioFrame;
use futures_util::stream::BoxStream;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A remote track the bridge has been subscribed to.
pub struct RemoteTrack {
    pub sid: String,
    pub kind: TrackKind,
    /// Inbound PCM, in arrival order. `None` for non-audio tracks. The stream
    /// ends when the track does.
    pub frames: Option<BoxStream<'static, AudioFrame>>,
}

impl RemoteTrack {
    pub fn audio(sid: impl Into<String>, frames: BoxStream<'static, AudioFrame>) -> Self {
        Self {
            sid: sid.into(),
            kind: TrackKind::Audio,
            frames: Some(frames),
        }
    }

    pub fn video(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            kind: TrackKind::Video,
            frames: None,
        }
    }
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("sid", &self.sid)
            .field("kind", &self.kind)
            .field("frames", &self.frames.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub enum RoomEvent {
    ParticipantJoined {
        identity: String,
    },
    TrackPublished {
        participant: String,
        sid: String,
        kind: TrackKind,
    },
    TrackSubscribed {
        participant: String,
        track: RemoteTrack,
    },
    Disconnected {
        reason: String,
    },
}

/// Destination for outbound audio on a published local track.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Queues one frame for playback. Suspends while the track is full.
    async fn capture_frame(&self, frame: AudioFrame) -> Result<(), TransportError>;
}

/// A joined room.
#[async_trait]
pub trait RoomHandle: Send + Sync {
    /// Creates and publishes a local audio track, returning its sink.
    async fn publish_audio_track(
        &self,
        name: &str,
        sample_rate: u32,
        num_channels: u32,
    ) -> Result<Arc<dyn AudioSink>, TransportError>;

    /// Leaves the room and closes any published tracks.
    async fn disconnect(&self);
}

pub struct RoomConnection {
    pub room: Box<dyn RoomHandle>,
    pub events: mpsc::UnboundedReceiver<RoomEvent>,
}

impl fmt::Debug for RoomConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomConnection").finish_non_exhaustive()
    }
}

#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Joins the session's room.
    ///
    /// Fails with `TransportErrorKind::ParticipantNotFound` when the remote
    /// participant has not joined yet.
    async fn connect(&self, session: &Session) -> Result<RoomConnection, TransportError>;
}
