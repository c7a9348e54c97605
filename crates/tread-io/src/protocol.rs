//! Wire messages for the bridge: newline-delimited JSON, one message per
//! line, tagged with a `type` field.

use serde::{Deserialize, Serialize};
use tread_core::{SessionState, WorkoutRecord, WorkoutSnapshot};

/// Commands a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CommandMsg {
    /// Change the belt speed, in tenths of km/h. Zero pauses.
    ChangeSpeed { speed: u16 },
    /// Change the countdown (or, while stopped, the default duration).
    ChangeTimer { seconds: u64 },
    /// End the session and record the workout.
    Stop,
}

impl CommandMsg {
    pub fn parse(line: &str) -> Option<Self> {
        serde_json::from_str(line).ok()
    }
}

/// The state event broadcast to every subscriber. Sent on connect, after
/// every command and on every ticker period.
#[derive(Debug, Serialize)]
pub struct StateMsg {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub state: SessionState,
    pub time_left_s: i64,
    pub speed: u16,
    pub completed_sessions: u64,
    pub recent_sessions: Vec<WorkoutRecord>,
}

impl StateMsg {
    pub fn new(snapshot: &WorkoutSnapshot) -> Self {
        Self {
            msg_type: "state",
            state: snapshot.state,
            time_left_s: snapshot.time_left_s,
            speed: snapshot.speed,
            completed_sessions: snapshot.completed_sessions,
            recent_sessions: snapshot.recent_sessions.clone(),
        }
    }

    /// Serialize as one wire line, newline included.
    pub fn to_line(&self) -> Vec<u8> {
        let mut line = serde_json::to_vec(self).unwrap_or_default();
        line.push(b'\n');
        line
    }
}
