use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use rppal::gpio::InputPin;

use super::decoder::encode;

/// Non-blocking read of one digital line.
///
/// Implementations must return immediately with `0` (low) or `1` (high).
/// A read never fails; a glitch shows up as an ordinary transition.
pub trait DigitalInput: Send {
    fn read_level(&self) -> u8;
}

impl DigitalInput for InputPin {
    fn read_level(&self) -> u8 {
        u8::from(self.is_high())
    }
}

/// In-memory line whose level is set by whoever holds a clone.
///
/// Used to drive encoders without hardware, e.g. from tests.
#[derive(Clone, Debug, Default)]
pub struct SimulatedLine {
    level: Arc<AtomicU8>,
}

impl SimulatedLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_level(&self, level: u8) {
        self.level.store(u8::from(level != 0), Ordering::Relaxed);
    }

    pub fn set_high(&self) {
        self.set_level(1);
    }

    pub fn set_low(&self) {
        self.set_level(0);
    }
}

impl DigitalInput for SimulatedLine {
    fn read_level(&self) -> u8 {
        self.level.load(Ordering::Relaxed)
    }
}

/// Reads the A/B lines of one encoder and packs them into a 2-bit code.
pub struct ChannelSampler {
    pin_a: Box<dyn DigitalInput>,
    pin_b: Box<dyn DigitalInput>,
}

impl ChannelSampler {
    pub fn new(pin_a: impl DigitalInput + 'static, pin_b: impl DigitalInput + 'static) -> Self {
        Self {
            pin_a: Box::new(pin_a),
            pin_b: Box::new(pin_b),
        }
    }

    /// Sample both lines once. A is read before B.
    pub fn sample(&self) -> u8 {
        let a = self.pin_a.read_level();
        let b = self.pin_b.read_level();
        encode(a, b)
    }
}

impl fmt::Debug for ChannelSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSampler").finish_non_exhaustive()
    }
}
