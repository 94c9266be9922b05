//! Synthesis emitter: one reply's audio into the outbound track.

use crate::error::VoiceError;
use crate::transport::AudioSink;
use crate::tts::SpeechSynthesizer;
use futures_util::StreamExt;
use std::sync::Arc;

/// Plays synthesized replies on the published bot track.
#[derive(Clone)]
pub struct SynthesisEmitter {
    tts: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
}

impl SynthesisEmitter {
    pub fn new(tts: Arc<dyn SpeechSynthesizer>, sink: Arc<dyn AudioSink>) -> Self {
        Self { tts, sink }
    }

    /// Streams `text` to the track, forwarding each chunk as soon as the
    /// synthesizer yields it. Returns the number of chunks played.
    ///
    /// An error aborts this reply only; frames already captured stay played.
    pub async fn speak(&self, text: &str) -> Result<usize, VoiceError> {
        let mut chunks = self.tts.synthesize(text).await?;
        let mut played = 0usize;
        while let Some(chunk) = chunks.next().await {
            let frame = chunk?;
            self.sink.capture_frame(frame).await?;
            played += 1;
        }
        tracing::debug!(chunks = played, "reply playback finished");
        Ok(played)
    }
}
