//! Streaming speech synthesis.

use crate::config::DeepgramConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use estatebot_types::AudioFrame;
use futures_util::future;
use futures_util::stream::{BoxStream, StreamExt};
use std::time::Duration;

/// Maximum text input size for one synthesis request, in characters.
const MAX_TTS_INPUT_CHARS: usize = 2_000;

/// Timeout for establishing a synthesis response.
const TTS_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Synthesized audio, in playback order. The stream ends with the reply.
pub type AudioChunkStream = BoxStream<'static, Result<AudioFrame, VoiceError>>;

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioChunkStream, VoiceError>;
}

/// Deepgram text-to-speech. Audio is requested as raw `linear16` and
/// yielded chunk by chunk as the response body arrives.
#[derive(Debug, Clone)]
pub struct DeepgramTts {
    client: reqwest::Client,
    config: DeepgramConfig,
}

impl DeepgramTts {
    pub fn new(config: DeepgramConfig) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(TTS_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| VoiceError::Tts(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn speak_url(&self) -> String {
        format!(
            "{}?model={}&encoding={}&sample_rate={}&container=none",
            self.config.speak_url,
            self.config.tts_model,
            self.config.tts_encoding,
            self.config.sample_rate
        )
    }
}

#[async_trait]
impl SpeechSynthesizer for DeepgramTts {
    async fn synthesize(&self, text: &str) -> Result<AudioChunkStream, VoiceError> {
        let chars = text.chars().count();
        if chars > MAX_TTS_INPUT_CHARS {
            return Err(VoiceError::Tts(format!(
                "text exceeds maximum size: {} characters (limit: {})",
                chars, MAX_TTS_INPUT_CHARS
            )));
        }

        let response = self
            .client
            .post(self.speak_url())
            .header("Authorization", format!("Token {}", self.config.api_key))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| VoiceError::Tts(format!("synthesis request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!(
                "synthesis returned {status}: {detail}"
            )));
        }

        let sample_rate = self.config.sample_rate;
        let frames = response
            .bytes_stream()
            .scan(PcmReframer::default(), move |reframer, chunk| {
                let item = match chunk {
                    Ok(bytes) => Ok(AudioFrame::new(reframer.push(&bytes), sample_rate, 1)),
                    Err(e) => Err(VoiceError::Tts(format!("synthesis stream failed: {e}"))),
                };
                future::ready(Some(item))
            })
            .filter(|item| future::ready(!matches!(item, Ok(frame) if frame.data.is_empty())));

        Ok(frames.boxed())
    }
}

/// Turns an arbitrary byte stream into little-endian i16 samples.
///
/// Network chunks can split a sample in half; the odd byte is held until the
/// next chunk arrives.
#[derive(Debug, Default)]
pub(crate) struct PcmReframer {
    pending: Option<u8>,
}

impl PcmReframer {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<i16> {
        let mut samples = Vec::with_capacity(bytes.len() / 2 + 1);
        let mut rest = bytes;

        if let Some(low) = self.pending.take() {
            match rest.split_first() {
                Some((&high, tail)) => {
                    samples.push(i16::from_le_bytes([low, high]));
                    rest = tail;
                }
                None => {
                    self.pending = Some(low);
                    return samples;
                }
            }
        }

        let mut pairs = rest.chunks_exact(2);
        for pair in &mut pairs {
            samples.push(i16::from_le_bytes([pair[0], pair[1]]));
        }
        self.pending = pairs.remainder().first().copied();
        samples
    }
}
