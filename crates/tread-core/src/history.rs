//! Append-only record of finished workouts.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One finished workout. Immutable once closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    pub started_unix_s: u64,
    pub ended_unix_s: u64,
}

impl WorkoutRecord {
    /// Close a record; the end is clamped to never precede the start.
    pub fn close(started: SystemTime, ended: SystemTime) -> Self {
        let started_unix_s = unix_secs(started);
        Self {
            started_unix_s,
            ended_unix_s: unix_secs(ended).max(started_unix_s),
        }
    }

    pub fn duration_s(&self) -> u64 {
        self.ended_unix_s - self.started_unix_s
    }
}

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Ordered log of finished workouts, insertion order = completion order.
#[derive(Debug, Default)]
pub struct SessionLog {
    records: Vec<WorkoutRecord>,
}

impl SessionLog {
    /// How many records a snapshot carries.
    pub const DEFAULT_RECENT: usize = 10;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: WorkoutRecord) {
        self.records.push(record);
    }

    /// The most recent `k` records, oldest first. Never mutates the log.
    pub fn recent(&self, k: usize) -> Vec<WorkoutRecord> {
        let skip = self.records.len().saturating_sub(k);
        self.records[skip..].to_vec()
    }

    /// Total workouts completed since startup.
    pub fn completed(&self) -> u64 {
        self.records.len() as u64
    }
}
