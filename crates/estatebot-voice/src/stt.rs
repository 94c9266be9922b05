//! Streaming speech recognition.
//!
//! A recognizer stream has two halves: a bounded frame input and an event
//! output. Dropping the input ends the stream; the recognizer flushes and the
//! event half closes once the last result is delivered.

use crate::config::DeepgramConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use estatebot_types::{AudioFrame, TranscriptEvent};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

pub type TranscriptResult = Result<TranscriptEvent, VoiceError>;

/// One open recognition stream.
#[derive(Debug)]
pub struct SttStream {
    /// Frames pushed here are recognized in order. `send` suspends while the
    /// recognizer is behind.
    pub input: mpsc::Sender<AudioFrame>,
    pub events: mpsc::Receiver<TranscriptResult>,
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn stream(&self) -> Result<SttStream, VoiceError>;
}

/// Deepgram live transcription over a WebSocket.
#[derive(Debug, Clone)]
pub struct DeepgramStt {
    config: DeepgramConfig,
    frame_capacity: usize,
    event_capacity: usize,
}

impl DeepgramStt {
    pub fn new(config: DeepgramConfig, frame_capacity: usize, event_capacity: usize) -> Self {
        Self {
            config,
            frame_capacity: frame_capacity.max(1),
            event_capacity: event_capacity.max(1),
        }
    }

    fn listen_url(&self) -> String {
        format!(
            "{}?model={}&encoding=linear16&sample_rate={}&channels=1&interim_results=true&punctuate=true&smart_format=true",
            self.config.listen_url, self.config.stt_model, self.config.input_sample_rate
        )
    }
}

#[async_trait]
impl SpeechToText for DeepgramStt {
    async fn stream(&self) -> Result<SttStream, VoiceError> {
        let mut request = self
            .listen_url()
            .into_client_request()
            .map_err(|e| VoiceError::Stt(format!("invalid listen url: {e}")))?;
        let auth = HeaderValue::from_str(&format!("Token {}", self.config.api_key))
            .map_err(|e| VoiceError::Stt(format!("invalid api key header: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let (socket, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| VoiceError::Stt(format!("failed to open recognizer socket: {e}")))?;
        let (mut writer, mut reader) = socket.split();

        let (input_tx, mut input_rx) = mpsc::channel::<AudioFrame>(self.frame_capacity);
        let (event_tx, event_rx) = mpsc::channel::<TranscriptResult>(self.event_capacity);

        tokio::spawn(async move {
            while let Some(frame) = input_rx.recv().await {
                if let Err(e) = writer.send(Message::Binary(frame.to_le_bytes().into())).await {
                    tracing::warn!(error = %e, "recognizer socket rejected audio");
                    return;
                }
            }
            // Input closed: ask the recognizer to flush the final results.
            let close = Message::Text(r#"{"type":"CloseStream"}"#.to_string().into());
            if let Err(e) = writer.send(close).await {
                tracing::debug!(error = %e, "recognizer socket already closed");
            }
        });

        tokio::spawn(async move {
            while let Some(message) = reader.next().await {
                let event = match message {
                    Ok(Message::Text(text)) => match parse_deepgram_message(&text) {
                        Ok(Some(event)) => Ok(event),
                        Ok(None) => continue,
                        Err(e) => {
                            tracing::debug!(error = %e, "skipping unrecognized recognizer message");
                            continue;
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => Err(VoiceError::Stt(format!("recognizer socket error: {e}"))),
                };
                let failed = event.is_err();
                if event_tx.send(event).await.is_err() || failed {
                    break;
                }
            }
            tracing::debug!("recognizer stream closed");
        });

        Ok(SttStream {
            input: input_tx,
            events: event_rx,
        })
    }
}

#[derive(Deserialize)]
struct DeepgramMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    is_final: bool,
    channel: Option<DeepgramChannel>,
}

#[derive(Deserialize)]
struct DeepgramChannel {
    #[serde(default)]
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Deserialize)]
struct DeepgramAlternative {
    #[serde(default)]
    transcript: String,
}

/// Maps a recognizer message to a transcript event. Metadata and
/// speech-boundary messages yield `None`.
pub(crate) fn parse_deepgram_message(text: &str) -> Result<Option<TranscriptEvent>, serde_json::Error> {
    let message: DeepgramMessage = serde_json::from_str(text)?;
    if message.kind != "Results" {
        return Ok(None);
    }
    let transcript = message
        .channel
        .and_then(|c| c.alternatives.into_iter().next())
        .map(|a| a.transcript)
        .unwrap_or_default();

    Ok(Some(if message.is_final {
        TranscriptEvent::final_text(transcript)
    } else {
        TranscriptEvent::partial(transcript)
    }))
}
