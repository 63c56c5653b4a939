use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use serde::{Deserialize, Serialize};
use statum::{machine, state};
use tracing::{debug, info};

use super::channel::{EncoderChannel, EncoderId};
use super::store::PositionStore;

// Wall-clock checks for stats logging are amortized over this many iterations.
const STATS_CHECK_EVERY: u64 = 1 << 16;

// Polling settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Name of the worker thread.
    pub thread_name: String,

    /// Pause between iterations in microseconds. `0` busy-polls.
    pub idle_interval_us: u64,

    /// Interval for the throughput log line. `0` disables it.
    pub stats_interval_secs: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            thread_name: "enc".to_string(),
            idle_interval_us: 0,
            stats_interval_secs: 10,
        }
    }
}

/// Observable phase of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Running,
    /// Stop requested, the current iteration is still finishing.
    Stopping,
    Stopped,
}

impl LoopPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LoopPhase::Running,
            1 => LoopPhase::Stopping,
            _ => LoopPhase::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LoopPhase::Running => 0,
            LoopPhase::Stopping => 1,
            LoopPhase::Stopped => 2,
        }
    }
}

/// Cooperative stop flag and phase shared between the worker and its owner.
#[derive(Debug)]
pub struct LoopControl {
    stop_requested: AtomicBool,
    phase: AtomicU8,
}

impl LoopControl {
    pub fn new() -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            phase: AtomicU8::new(LoopPhase::Running.as_u8()),
        }
    }

    /// Ask the worker to exit after the iteration in flight.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        // Only RUNNING moves to STOPPING; STOPPED is terminal.
        let _ = self.phase.compare_exchange(
            LoopPhase::Running.as_u8(),
            LoopPhase::Stopping.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> LoopPhase {
        LoopPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn mark_stopped(&self) {
        self.phase
            .store(LoopPhase::Stopped.as_u8(), Ordering::Release);
    }
}

impl Default for LoopControl {
    fn default() -> Self {
        Self::new()
    }
}

// Loop states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum LoopState {
    Ready,
    Stopped,
}

#[machine]
pub struct PollingLoop<S: LoopState> {
    // ENC1 then ENC2
    channels: [EncoderChannel; 2],

    // Where committed positions are published
    store: Arc<PositionStore>,

    settings: PollingSettings,

    // Completed iterations
    iterations: u64,
}

// Methods available in all states
impl<S: LoopState> PollingLoop<S> {
    pub fn positions(&self) -> (i32, i32) {
        (self.channels[0].position(), self.channels[1].position())
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn ambiguous_counts(&self) -> (u64, u64) {
        (
            self.channels[0].ambiguous_count(),
            self.channels[1].ambiguous_count(),
        )
    }

    pub fn settings(&self) -> &PollingSettings {
        &self.settings
    }
}

impl PollingLoop<Ready> {
    /// `enc1` and `enc2` must carry the matching [`EncoderId`]s.
    pub fn create(
        enc1: EncoderChannel,
        enc2: EncoderChannel,
        store: Arc<PositionStore>,
        settings: PollingSettings,
    ) -> Self {
        debug_assert_eq!(enc1.id(), EncoderId::Enc1);
        debug_assert_eq!(enc2.id(), EncoderId::Enc2);
        debug!("Creating polling loop with settings: {:?}", settings);
        Self::new([enc1, enc2], store, settings, 0)
    }

    /// One full pass: every channel is sampled, decoded and published once,
    /// in order.
    pub fn iterate(&mut self) {
        for channel in self.channels.iter_mut() {
            let position = channel.poll();
            self.store.publish(channel.id(), position);
        }
        self.iterations = self.iterations.wrapping_add(1);
    }

    /// Poll until `control` requests a stop. The stop check happens only
    /// after a full iteration, so the iteration in flight always completes.
    pub fn run(mut self, control: &LoopControl) -> PollingLoop<Stopped> {
        info!(
            "Starting polling loop (idle interval {} us)",
            self.settings.idle_interval_us
        );

        let idle = Duration::from_micros(self.settings.idle_interval_us);
        let stats_interval = chrono::Duration::try_seconds(
            i64::try_from(self.settings.stats_interval_secs).unwrap_or(i64::MAX),
        )
        .unwrap_or(chrono::Duration::MAX);
        let mut last_log_time = Local::now();
        let mut last_log_iterations = self.iterations;

        loop {
            self.iterate();

            if control.stop_requested() {
                break;
            }

            if self.settings.stats_interval_secs > 0
                && self.iterations % STATS_CHECK_EVERY == 0
            {
                let now = Local::now();
                if now - last_log_time > stats_interval {
                    let done = self.iterations.wrapping_sub(last_log_iterations);
                    let (enc1, enc2) = self.positions();
                    info!(
                        "Polling stats: {} iterations in last {} seconds (avg {:.0}/sec), positions {} {}",
                        done,
                        stats_interval.num_seconds(),
                        done as f64 / stats_interval.num_seconds().max(1) as f64,
                        enc1,
                        enc2
                    );
                    last_log_time = now;
                    last_log_iterations = self.iterations;
                }
            }

            if !idle.is_zero() {
                std::thread::sleep(idle);
            }
        }

        control.mark_stopped();
        let (enc1, enc2) = self.positions();
        info!(
            "Polling loop stopped after {} iterations, positions {} {}",
            self.iterations, enc1, enc2
        );
        self.transition()
    }
}

impl PollingLoop<Stopped> {
    /// Drop the channels, and with them the input lines they own.
    pub fn release(self) -> (i32, i32) {
        let positions = self.positions();
        let (ambiguous1, ambiguous2) = self.ambiguous_counts();
        info!(
            "Releasing encoder lines (ambiguous transitions: {} {})",
            ambiguous1, ambiguous2
        );
        drop(self);
        positions
    }
}
