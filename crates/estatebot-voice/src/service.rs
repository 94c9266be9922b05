use crate::config::LiveKitConfig;
use crate::error::{TransportError, TransportErrorKind, VoiceError};
use livekit_api::access_token::{AccessToken, VideoGrants};
use livekit_api::services::room::RoomClient;
use livekit_api::services::{ServiceError, TwirpError, TwirpErrorCode};
use livekit_protocol::ParticipantInfo;
use std::time::Duration;

/// Server-side LiveKit API access: join tokens and participant lookups.
#[derive(Debug)]
pub struct VoiceService {
    config: LiveKitConfig,
    room_client: RoomClient,
}

impl VoiceService {
    pub fn new(config: LiveKitConfig) -> Self {
        let room_client =
            RoomClient::with_api_key(&config.url, &config.api_key, &config.api_secret);
        Self {
            config,
            room_client,
        }
    }

    pub fn get_url(&self) -> &str {
        &self.config.url
    }

    /// Mints the token the bridge joins with. Audio-only publish is enough,
    /// but subscribe is required to hear the participant.
    pub fn generate_join_token(
        &self,
        room_name: &str,
        participant_identity: &str,
        participant_name: &str,
    ) -> Result<String, VoiceError> {
        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(participant_identity)
            .with_name(participant_name)
            .with_grants(VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: false,
                ..Default::default()
            })
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds));

        token.to_jwt().map_err(VoiceError::LiveKit)
    }

    /// Looks up the remote participant. A missing room or participant maps
    /// to `TransportErrorKind::ParticipantNotFound`.
    pub async fn ensure_participant(
        &self,
        room: &str,
        identity: &str,
    ) -> Result<ParticipantInfo, TransportError> {
        self.room_client
            .get_participant(room, identity)
            .await
            .map_err(|e| TransportError::new(classify_service_error(&e), e.to_string()))
    }
}

/// Maps a room-service error onto a stable kind. Twirp responses are
/// classified by their error code; transport failures fall back to the
/// rendered message.
pub(crate) fn classify_service_error(error: &ServiceError) -> TransportErrorKind {
    match error {
        ServiceError::Twirp(TwirpError::Twirp(code)) => classify_twirp_code(&code.code),
        ServiceError::AccessToken(_) => TransportErrorKind::Unauthorized,
        other => classify_error_message(&other.to_string()),
    }
}

fn classify_twirp_code(code: &str) -> TransportErrorKind {
    match code {
        TwirpErrorCode::NOT_FOUND => TransportErrorKind::ParticipantNotFound,
        TwirpErrorCode::UNAUTHENTICATED | TwirpErrorCode::PERMISSION_DENIED => {
            TransportErrorKind::Unauthorized
        }
        TwirpErrorCode::UNAVAILABLE | TwirpErrorCode::DEADLINE_EXCEEDED => {
            TransportErrorKind::Unreachable
        }
        _ => TransportErrorKind::Other,
    }
}

fn classify_error_message(message: &str) -> TransportErrorKind {
    let lower = message.to_ascii_lowercase();
    if lower.contains("not_found") || lower.contains("not found") {
        TransportErrorKind::ParticipantNotFound
    } else if lower.contains("unauthenticated")
        || lower.contains("permission_denied")
        || lower.contains("invalid access token")
    {
        TransportErrorKind::Unauthorized
    } else if lower.contains("failed to execute the request")
        || lower.contains("connection refused")
        || lower.contains("dns error")
        || lower.contains("unavailable")
    {
        TransportErrorKind::Unreachable
    } else {
        TransportErrorKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn twirp(code: &str, msg: &str) -> ServiceError {
        ServiceError::Twirp(TwirpError::Twirp(TwirpErrorCode {
            code: code.to_string(),
            msg: msg.to_string(),
        }))
    }

    #[test]
    fn twirp_codes_map_to_kinds() {
        assert_eq!(
            classify_service_error(&twirp("not_found", "participant not found")),
            TransportErrorKind::ParticipantNotFound
        );
        assert_eq!(
            classify_service_error(&twirp("unauthenticated", "invalid token")),
            TransportErrorKind::Unauthorized
        );
        assert_eq!(
            classify_service_error(&twirp("permission_denied", "no roomAdmin grant")),
            TransportErrorKind::Unauthorized
        );
        assert_eq!(
            classify_service_error(&twirp("unavailable", "node draining")),
            TransportErrorKind::Unreachable
        );
        assert_eq!(
            classify_service_error(&twirp("internal", "boom")),
            TransportErrorKind::Other
        );
    }

    #[test]
    fn code_wins_over_message_text() {
        assert_eq!(
            classify_service_error(&twirp("internal", "room not found in cache")),
            TransportErrorKind::Other
        );
    }

    #[test]
    fn untyped_failures_fall_back_to_message() {
        assert_eq!(
            classify_error_message(
                "twirp error: failed to execute the request: error sending request: Connection refused"
            ),
            TransportErrorKind::Unreachable
        );
        assert_eq!(
            classify_error_message("url error: relative URL without a base"),
            TransportErrorKind::Other
        );
    }
}
