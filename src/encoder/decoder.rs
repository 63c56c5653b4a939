//! Quadrature decoding state machine
//!
//! Turns a stream of 2-bit channel codes into signed position steps. The
//! code for a pair of raw levels is `(a ^ b) | (b << 1)`, which walks the
//! cycle `0 → 1 → 2 → 3 → 0` for one direction of rotation and the reverse
//! cycle for the other.
//!
//! # Transition table
//!
//! ```text
//! delta = current - previous   (signed, not reduced mod 4)
//!
//!   0        -> idle        0
//!   1 | -3   -> forward    +1
//!  -1 |  3   -> backward   -1
//!   2 | -2   -> ambiguous  (see AmbiguousPolicy)
//! ```
//!
//! A jump of two means the poller missed an edge and the direction can not
//! be recovered from the two observed codes.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Only the two low bits of a code are meaningful.
pub const CODE_MASK: u8 = 0b11;

/// Pack raw A/B levels into the 2-bit code the decoder consumes.
///
/// Bit 1 is the raw B level, bit 0 is `A XOR B`. Any non-zero level counts
/// as high.
pub fn encode(a: u8, b: u8) -> u8 {
    let a = u8::from(a != 0);
    let b = u8::from(b != 0);
    (a ^ b) | (b << 1)
}

/// How a jump of two codes is turned into a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguousPolicy {
    /// Add the raw delta and then apply one backward step on the same call:
    /// +2 nets +1, -2 nets -3.
    #[default]
    Literal,
    /// Add only the raw delta: +2 nets +2, -2 nets -2.
    RawDelta,
}

/// Classification of one code-to-code transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Idle,
    Forward,
    Backward,
    /// Two-code jump, carrying the signed delta (`2` or `-2`).
    Ambiguous(i8),
}

impl Transition {
    pub fn classify(previous: u8, current: u8) -> Self {
        let delta = (current & CODE_MASK) as i8 - (previous & CODE_MASK) as i8;
        match delta {
            0 => Transition::Idle,
            1 | -3 => Transition::Forward,
            -1 | 3 => Transition::Backward,
            _ => Transition::Ambiguous(delta),
        }
    }

    /// Position step this transition contributes under `policy`.
    pub fn step(self, policy: AmbiguousPolicy) -> i32 {
        match self {
            Transition::Idle => 0,
            Transition::Forward => 1,
            Transition::Backward => -1,
            Transition::Ambiguous(delta) => match policy {
                AmbiguousPolicy::Literal => i32::from(delta) - 1,
                AmbiguousPolicy::RawDelta => i32::from(delta),
            },
        }
    }
}

/// Step for a single transition with the default [`AmbiguousPolicy::Literal`].
///
/// Pure and total: every one of the 16 `(previous, current)` pairs yields a
/// step. Bits above [`CODE_MASK`] are ignored.
pub fn decode(previous: u8, current: u8) -> i32 {
    Transition::classify(previous, current).step(AmbiguousPolicy::Literal)
}

/// Per-encoder decoder. The last observed code is the only carried state.
#[derive(Debug, Clone)]
pub struct QuadratureDecoder {
    last_code: u8,
    policy: AmbiguousPolicy,
    ambiguous_count: u64,
}

impl QuadratureDecoder {
    pub fn new(policy: AmbiguousPolicy) -> Self {
        Self {
            last_code: 0,
            policy,
            ambiguous_count: 0,
        }
    }

    /// Decode `code` against the previous sample and remember it.
    pub fn update(&mut self, code: u8) -> i32 {
        let code = code & CODE_MASK;
        let transition = Transition::classify(self.last_code, code);
        if let Transition::Ambiguous(delta) = transition {
            self.ambiguous_count = self.ambiguous_count.wrapping_add(1);
            debug!(
                "Ambiguous transition {} -> {} (delta {}), applying {:?} policy",
                self.last_code, code, delta, self.policy
            );
        }
        self.last_code = code;
        transition.step(self.policy)
    }

    pub fn last_code(&self) -> u8 {
        self.last_code
    }

    pub fn policy(&self) -> AmbiguousPolicy {
        self.policy
    }

    /// Number of two-code jumps seen so far.
    pub fn ambiguous_count(&self) -> u64 {
        self.ambiguous_count
    }
}

impl Default for QuadratureDecoder {
    fn default() -> Self {
        Self::new(AmbiguousPolicy::default())
    }
}
