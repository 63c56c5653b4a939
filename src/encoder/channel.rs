use std::fmt;

use serde::{Deserialize, Serialize};

use super::decoder::{AmbiguousPolicy, QuadratureDecoder};
use super::sampler::ChannelSampler;

/// The two encoders, in polling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncoderId {
    Enc1,
    Enc2,
}

impl EncoderId {
    pub const ALL: [EncoderId; 2] = [EncoderId::Enc1, EncoderId::Enc2];

    pub fn index(self) -> usize {
        match self {
            EncoderId::Enc1 => 0,
            EncoderId::Enc2 => 1,
        }
    }
}

impl fmt::Display for EncoderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncoderId::Enc1 => write!(f, "ENC1"),
            EncoderId::Enc2 => write!(f, "ENC2"),
        }
    }
}

/// One physical encoder: its lines, its decoder state and its running count.
#[derive(Debug)]
pub struct EncoderChannel {
    id: EncoderId,
    sampler: ChannelSampler,
    decoder: QuadratureDecoder,
    // Wraps on overflow like the 32-bit accumulator it replaces.
    position: i32,
}

impl EncoderChannel {
    pub fn new(id: EncoderId, sampler: ChannelSampler, policy: AmbiguousPolicy) -> Self {
        Self {
            id,
            sampler,
            decoder: QuadratureDecoder::new(policy),
            position: 0,
        }
    }

    /// Sample, decode against the previous code, accumulate. Returns the new
    /// position.
    pub fn poll(&mut self) -> i32 {
        let code = self.sampler.sample();
        let step = self.decoder.update(code);
        self.position = self.position.wrapping_add(step);
        self.position
    }

    pub fn id(&self) -> EncoderId {
        self.id
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    pub fn last_code(&self) -> u8 {
        self.decoder.last_code()
    }

    pub fn ambiguous_count(&self) -> u64 {
        self.decoder.ambiguous_count()
    }
}
