//! Shared, externally readable encoder positions
//!
//! The polling worker is the only writer. Each slot is an `AtomicI32`, so a
//! reader never sees a torn value, but the two slots are not read as one
//! unit: a read may pair ENC1 from one iteration with ENC2 from another.

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};

use chrono::{DateTime, Local};
use serde::Serialize;

use super::channel::EncoderId;

#[derive(Debug, Default)]
pub struct PositionStore {
    slots: [AtomicI32; 2],
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a new position for `id`. Called from the polling worker only.
    pub fn publish(&self, id: EncoderId, position: i32) {
        self.slots[id.index()].store(position, Ordering::Relaxed);
    }

    pub fn get(&self, id: EncoderId) -> i32 {
        self.slots[id.index()].load(Ordering::Relaxed)
    }

    /// Current `(enc1, enc2)` positions.
    pub fn read(&self) -> (i32, i32) {
        (self.get(EncoderId::Enc1), self.get(EncoderId::Enc2))
    }

    /// Attribute text: `"<enc1> <enc2>"`, no trailing newline.
    pub fn render(&self) -> String {
        let (enc1, enc2) = self.read();
        format!("{} {}", enc1, enc2)
    }

    pub fn snapshot(&self) -> PositionSnapshot {
        let (enc1, enc2) = self.read();
        PositionSnapshot {
            enc1,
            enc2,
            timestamp: Local::now(),
        }
    }
}

/// Positions as seen by one read of the store, stamped with the read time.
#[derive(Clone, Debug, Serialize)]
pub struct PositionSnapshot {
    pub enc1: i32,
    pub enc2: i32,
    pub timestamp: DateTime<Local>,
}

impl PositionSnapshot {
    pub fn positions(&self) -> (i32, i32) {
        (self.enc1, self.enc2)
    }
}

impl Default for PositionSnapshot {
    fn default() -> Self {
        Self {
            enc1: 0,
            enc2: 0,
            timestamp: Local::now(),
        }
    }
}

impl fmt::Display for PositionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.enc1, self.enc2)
    }
}
