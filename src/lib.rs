//! Quadrature decoding for two incremental rotary encoders on GPIO.
//!
//! A dedicated worker busy-polls the A/B lines of both encoders, decodes
//! every 2-bit transition into a signed step and keeps a wrapping 32-bit
//! position per encoder. Positions are published as one text line,
//! `"<enc1> <enc2>"`.

pub mod config;
pub mod encoder;
pub mod gpio;
pub mod publish;
pub mod service;

pub use config::{ConfigError, ConfigSource, EncodioConfig};
pub use service::{EncoderService, ServiceError};
