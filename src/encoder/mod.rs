//! Encoder subsystem: quadrature decoding for two rotary encoders
//!
//! Pipeline, leaves first:
//!
//! 1. [`sampler`] - reads the A/B lines of one encoder into a 2-bit code
//! 2. [`decoder`] - turns consecutive codes into signed steps
//! 3. [`channel`] - one encoder: sampler, decoder and running position
//! 4. [`polling_loop`] - samples ENC1 then ENC2, forever, until told to stop
//! 5. [`store`] - positions published for readers
//! 6. [`worker`] - the thread the loop runs on
//!
//! # Architecture
//!
//! ```text
//! GPIO A/B ──► ChannelSampler ──► QuadratureDecoder ──► PositionStore ──► readers
//!              (2-bit code)       (signed step)         (AtomicI32 x2)
//! ```
//!
//! The polling worker is the only writer of decoder state and positions.

pub mod channel;
pub mod decoder;
pub mod polling_loop;
pub mod sampler;
pub mod store;
pub mod worker;

pub use channel::{EncoderChannel, EncoderId};
pub use decoder::{decode, encode, AmbiguousPolicy, QuadratureDecoder, Transition};
pub use polling_loop::{LoopControl, LoopPhase, PollingLoop, PollingSettings, Ready, Stopped};
pub use sampler::{ChannelSampler, DigitalInput, SimulatedLine};
pub use store::{PositionSnapshot, PositionStore};
pub use worker::{PollingError, PollingHandle};
