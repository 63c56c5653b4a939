//! GPIO line reservation for the encoder inputs.
//!
//! Pins are addressed by BCM number and claimed as inputs through `rppal`.
//! A claimed [`InputPin`] is released (and its mode restored) when dropped,
//! so the lines stay reserved for exactly as long as the polling loop owns
//! its samplers.

use std::collections::HashSet;

use rppal::gpio::{Gpio, InputPin};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::encoder::{AmbiguousPolicy, ChannelSampler, EncoderChannel, EncoderId};

#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    #[error("GPIO controller unavailable: {0}")]
    Unavailable(#[source] rppal::gpio::Error),

    #[error("Failed to reserve pin {pin} ({label}): {source}")]
    Reserve {
        pin: u8,
        label: String,
        #[source]
        source: rppal::gpio::Error,
    },

    #[error("Pin {0} is assigned more than once")]
    DuplicatePin(u8),
}

/// The A and B lines of one encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinPair {
    pub pin_a: u8,
    pub pin_b: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodersConfig {
    pub ambiguous_policy: AmbiguousPolicy,
    pub enc1: PinPair,
    pub enc2: PinPair,
}

impl Default for EncodersConfig {
    fn default() -> Self {
        Self {
            ambiguous_policy: AmbiguousPolicy::Literal,
            enc1: PinPair { pin_a: 18, pin_b: 16 },
            enc2: PinPair { pin_a: 24, pin_b: 22 },
        }
    }
}

impl EncodersConfig {
    pub fn pair(&self, id: EncoderId) -> PinPair {
        match id {
            EncoderId::Enc1 => self.enc1,
            EncoderId::Enc2 => self.enc2,
        }
    }

    /// All four pins with their labels, in reservation order.
    pub fn labelled_pins(&self) -> [(String, u8); 4] {
        [
            ("E1A".to_string(), self.enc1.pin_a),
            ("E1B".to_string(), self.enc1.pin_b),
            ("E2A".to_string(), self.enc2.pin_a),
            ("E2B".to_string(), self.enc2.pin_b),
        ]
    }

    /// Every line must be distinct.
    pub fn validate(&self) -> Result<(), GpioError> {
        let mut seen = HashSet::new();
        for (_, pin) in self.labelled_pins() {
            if !seen.insert(pin) {
                return Err(GpioError::DuplicatePin(pin));
            }
        }
        Ok(())
    }
}

/// Reserve all four lines as inputs and build the two encoder channels.
///
/// Nothing is kept on failure: lines reserved before the failing one are
/// released again when their pins are dropped.
pub fn reserve_channels(
    config: &EncodersConfig,
) -> Result<(EncoderChannel, EncoderChannel), GpioError> {
    info!("ENC: starting gpio...");
    config.validate()?;

    let gpio = Gpio::new().map_err(|e| {
        error!("Failed to open GPIO controller: {}", e);
        GpioError::Unavailable(e)
    })?;

    let enc1 = reserve_channel(&gpio, config, EncoderId::Enc1)?;
    let enc2 = reserve_channel(&gpio, config, EncoderId::Enc2)?;
    info!("ENC: starting gpio done.");
    Ok((enc1, enc2))
}

fn reserve_channel(
    gpio: &Gpio,
    config: &EncodersConfig,
    id: EncoderId,
) -> Result<EncoderChannel, GpioError> {
    let pair = config.pair(id);
    let n = id.index() + 1;
    let pin_a = reserve_input(gpio, pair.pin_a, &format!("E{}A", n))?;
    let pin_b = reserve_input(gpio, pair.pin_b, &format!("E{}B", n))?;
    Ok(EncoderChannel::new(
        id,
        ChannelSampler::new(pin_a, pin_b),
        config.ambiguous_policy,
    ))
}

fn reserve_input(gpio: &Gpio, pin: u8, label: &str) -> Result<InputPin, GpioError> {
    debug!("Reserving pin {} as {}", pin, label);
    let input = gpio
        .get(pin)
        .map_err(|source| {
            error!("Failed to reserve pin {} ({}): {}", pin, label, source);
            GpioError::Reserve {
                pin,
                label: label.to_string(),
                source,
            }
        })?
        .into_input();
    Ok(input)
}
