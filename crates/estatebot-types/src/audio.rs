//! PCM audio frames exchanged between the media room and the speech engines.

use serde::{Deserialize, Serialize};

/// Interleaved signed 16-bit PCM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFrame {
    pub data: Vec<i16>,
    pub sample_rate: u32,
    pub num_channels: u32,
}

impl AudioFrame {
    pub fn new(data: Vec<i16>, sample_rate: u32, num_channels: u32) -> Self {
        Self {
            data,
            sample_rate,
            num_channels,
        }
    }

    /// Number of samples per channel in this frame.
    pub fn samples_per_channel(&self) -> u32 {
        if self.num_channels == 0 {
            return 0;
        }
        (self.data.len() / self.num_channels as usize) as u32
    }

    /// Little-endian byte encoding, as expected by `linear16` recognizers.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() * 2);
        for sample in &self.data {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        out
    }
}
