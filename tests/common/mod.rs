#![allow(dead_code)]

use std::time::{Duration, Instant};

use encodio::encoder::{
    AmbiguousPolicy, ChannelSampler, EncoderChannel, EncoderId, PositionStore, SimulatedLine,
};

/// Raw (a, b) levels for one forward revolution of the quadrature cycle.
pub const FORWARD: [(u8, u8); 4] = [(0, 0), (1, 0), (1, 1), (0, 1)];

/// Raw (a, b) levels for one backward revolution.
pub const BACKWARD: [(u8, u8); 4] = [(0, 0), (0, 1), (1, 1), (1, 0)];

/// The A and B lines of one simulated encoder.
#[derive(Clone, Debug, Default)]
pub struct Lines {
    pub a: SimulatedLine,
    pub b: SimulatedLine,
}

impl Lines {
    pub fn set(&self, (a, b): (u8, u8)) {
        self.a.set_level(a);
        self.b.set_level(b);
    }

    /// Levels after `step` steps along `cycle`.
    pub fn set_step(&self, cycle: &[(u8, u8); 4], step: usize) {
        self.set(cycle[step % 4]);
    }
}

pub fn channel(id: EncoderId, lines: &Lines, policy: AmbiguousPolicy) -> EncoderChannel {
    EncoderChannel::new(
        id,
        ChannelSampler::new(lines.a.clone(), lines.b.clone()),
        policy,
    )
}

/// Spin until `id` reaches `expected` or five seconds pass.
pub fn wait_for_position(store: &PositionStore, id: EncoderId, expected: i32) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while store.get(id) != expected {
        assert!(
            Instant::now() < deadline,
            "{} stuck at {}, expected {}",
            id,
            store.get(id),
            expected
        );
        std::thread::sleep(Duration::from_millis(1));
    }
}
