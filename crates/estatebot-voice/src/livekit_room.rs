//! LiveKit-backed media transport.

use crate::config::Session;
use crate::error::{TransportError, TransportErrorKind};
use crate::service::VoiceService;
use crate::transport::{
    AudioSink, MediaTransport, RemoteTrack, RoomConnection, RoomEvent, RoomHandle, TrackKind,
};
use async_trait::async_trait;
use estatebot_types::AudioFrame;
use futures_util::StreamExt;
use livekit::options::TrackPublishOptions;
use livekit::track::{LocalAudioTrack, LocalTrack, TrackSource};
use livekit::webrtc::audio_frame::AudioFrame as RtcAudioFrame;
use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::audio_source::{AudioSourceOptions, RtcAudioSource};
use livekit::webrtc::audio_stream::native::NativeAudioStream;
use livekit::{Room, RoomOptions};
use std::borrow::Cow;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Joins rooms as `<participant>-agent` using server-minted tokens.
pub struct LiveKitTransport {
    service: VoiceService,
    inbound_sample_rate: u32,
}

impl LiveKitTransport {
    pub fn new(service: VoiceService, inbound_sample_rate: u32) -> Self {
        Self {
            service,
            inbound_sample_rate,
        }
    }
}

#[async_trait]
impl MediaTransport for LiveKitTransport {
    async fn connect(&self, session: &Session) -> Result<RoomConnection, TransportError> {
        self.service
            .ensure_participant(&session.room, &session.participant_identity)
            .await?;

        let identity = session.agent_identity();
        let token = self
            .service
            .generate_join_token(&session.room, &identity, &identity)
            .map_err(|e| TransportError::new(TransportErrorKind::Unauthorized, e.to_string()))?;

        let (room, mut lk_events) =
            Room::connect(self.service.get_url(), &token, RoomOptions::default())
                .await
                .map_err(|e| TransportError::new(TransportErrorKind::Unreachable, e.to_string()))?;

        let (tx, events) = mpsc::unbounded_channel();
        let rate = self.inbound_sample_rate;
        tokio::spawn(async move {
            while let Some(event) = lk_events.recv().await {
                if let Some(event) = map_room_event(event, rate) {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        Ok(RoomConnection {
            room: Box::new(LiveKitRoom { room }),
            events,
        })
    }
}

fn map_room_event(event: livekit::RoomEvent, inbound_sample_rate: u32) -> Option<RoomEvent> {
    match event {
        livekit::RoomEvent::ParticipantConnected(participant) => Some(RoomEvent::ParticipantJoined {
            identity: participant.identity().0,
        }),
        livekit::RoomEvent::TrackPublished {
            publication,
            participant,
        } => Some(RoomEvent::TrackPublished {
            participant: participant.identity().0,
            sid: publication.sid().to_string(),
            kind: match publication.kind() {
                livekit::track::TrackKind::Audio => TrackKind::Audio,
                livekit::track::TrackKind::Video => TrackKind::Video,
            },
        }),
        livekit::RoomEvent::TrackSubscribed {
            track, participant, ..
        } => {
            let track = match track {
                livekit::track::RemoteTrack::Audio(audio) => {
                    let sid = audio.sid().to_string();
                    let frames = NativeAudioStream::new(
                        audio.rtc_track(),
                        inbound_sample_rate as i32,
                        1,
                    )
                    .map(|frame| {
                        AudioFrame::new(frame.data.into_owned(), frame.sample_rate, frame.num_channels)
                    })
                    .boxed();
                    RemoteTrack::audio(sid, frames)
                }
                livekit::track::RemoteTrack::Video(video) => RemoteTrack::video(video.sid().to_string()),
            };
            Some(RoomEvent::TrackSubscribed {
                participant: participant.identity().0,
                track,
            })
        }
        livekit::RoomEvent::Disconnected { reason } => Some(RoomEvent::Disconnected {
            reason: reason.as_str_name().to_string(),
        }),
        _ => None,
    }
}

struct LiveKitRoom {
    room: Room,
}

#[async_trait]
impl RoomHandle for LiveKitRoom {
    async fn publish_audio_track(
        &self,
        name: &str,
        sample_rate: u32,
        num_channels: u32,
    ) -> Result<Arc<dyn AudioSink>, TransportError> {
        let source = NativeAudioSource::new(
            AudioSourceOptions::default(),
            sample_rate,
            num_channels,
            100,
        );
        let track = LocalAudioTrack::create_audio_track(name, RtcAudioSource::Native(source.clone()));
        self.room
            .local_participant()
            .publish_track(
                LocalTrack::Audio(track),
                TrackPublishOptions {
                    source: TrackSource::Microphone,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| TransportError::new(TransportErrorKind::Publish, e.to_string()))?;
        Ok(Arc::new(NativeSink { source }))
    }

    async fn disconnect(&self) {
        if let Err(e) = self.room.close().await {
            tracing::warn!(error = %e, "failed to close room cleanly");
        }
    }
}

struct NativeSink {
    source: NativeAudioSource,
}

#[async_trait]
impl AudioSink for NativeSink {
    async fn capture_frame(&self, frame: AudioFrame) -> Result<(), TransportError> {
        let samples_per_channel = frame.samples_per_channel();
        let rtc_frame = RtcAudioFrame {
            data: Cow::Owned(frame.data),
            sample_rate: frame.sample_rate,
            num_channels: frame.num_channels,
            samples_per_channel,
        };
        self.source
            .capture_frame(&rtc_frame)
            .await
            .map_err(|e| TransportError::new(TransportErrorKind::Publish, e.to_string()))
    }
}
