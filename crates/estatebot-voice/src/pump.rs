//! Audio ingest pump: remote track frames into the recognizer.

use estatebot_types::AudioFrame;
use futures_util::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Forwards inbound frames to the recognizer input in arrival order.
///
/// Nothing is buffered here: each frame is handed to the bounded recognizer
/// input before the next one is read, so a slow recognizer suspends the
/// pump instead of growing memory. Returns the number of frames forwarded
/// once the track ends, the recognizer input closes, or `cancel` fires.
pub async fn pump_audio(
    mut frames: BoxStream<'static, AudioFrame>,
    input: mpsc::Sender<AudioFrame>,
    cancel: CancellationToken,
) -> u64 {
    let mut forwarded = 0u64;

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = frames.next() => match next {
                Some(frame) => frame,
                None => {
                    tracing::debug!(forwarded, "inbound audio track ended");
                    break;
                }
            },
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = input.send(frame) => {
                if sent.is_err() {
                    tracing::debug!(forwarded, "recognizer input closed");
                    break;
                }
            }
        }

        forwarded += 1;
        if forwarded % 1_000 == 0 {
            tracing::trace!(forwarded, "audio frames forwarded");
        }
    }

    forwarded
}
