//! Workout session state machine and the session/actuator controller.
//!
//! The session tracks a countdown against wall-clock time. Pausing freezes
//! the countdown; resuming shifts the reference start forward by the pause
//! duration so paused time never consumes budget. Finished sessions are
//! recorded into the [`SessionLog`](crate::history::SessionLog).

use crate::actuator::Treadmill;
use crate::broadcast::SnapshotBus;
use crate::hal::HardwareError;
use crate::history::{SessionLog, WorkoutRecord};
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Countdown used when a session starts without one being configured.
pub const DEFAULT_WORKOUT_SECS: u64 = 1800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Stopped,
    Running,
    Paused,
}

/// Read-only view of the session, safe to hand to any observer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutSnapshot {
    pub state: SessionState,
    pub time_left_s: i64,
    pub speed: u16,
    pub completed_sessions: u64,
    pub recent_sessions: Vec<WorkoutRecord>,
}

/// The countdown state machine.
///
/// Field invariants (checked by the state accessors and the tests):
/// Stopped means no start time, no pause time and no in-flight record;
/// Paused means a pause time is set; Running means a start time is set and
/// no pause time.
#[derive(Debug)]
pub struct WorkoutSession {
    default_duration: u64,
    target_duration: u64,
    start_time: Option<Instant>,
    pause_time: Option<Instant>,
    workout_started: Option<SystemTime>,
    log: SessionLog,
}

impl WorkoutSession {
    pub fn new(default_duration_s: u64) -> Self {
        Self {
            default_duration: default_duration_s,
            target_duration: default_duration_s,
            start_time: None,
            pause_time: None,
            workout_started: None,
            log: SessionLog::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        match (self.start_time, self.pause_time) {
            (None, _) => SessionState::Stopped,
            (Some(_), Some(_)) => SessionState::Paused,
            (Some(_), None) => SessionState::Running,
        }
    }

    /// Begin a fresh session against the default duration.
    /// Meaningful only while stopped; an active session is left alone.
    pub fn start(&mut self) {
        if self.state() != SessionState::Stopped {
            return;
        }
        self.target_duration = self.default_duration;
        self.workout_started = Some(SystemTime::now());
        self.start_time = Some(Instant::now());
        self.pause_time = None;
        info!("session started, {} s on the clock", self.target_duration);
    }

    /// Freeze the countdown. No-op unless running.
    pub fn pause(&mut self) {
        if self.state() == SessionState::Running {
            self.pause_time = Some(Instant::now());
            debug!("session paused with {} s left", self.time_left_s());
        }
    }

    /// Unfreeze the countdown, shifting the reference start forward by the
    /// pause duration so the pause never counts as elapsed time.
    pub fn resume(&mut self) {
        if let (Some(start), Some(paused_at)) = (self.start_time, self.pause_time) {
            self.start_time = Some(start + paused_at.elapsed());
            self.pause_time = None;
            debug!("session resumed with {} s left", self.time_left_s());
        }
    }

    /// Change the countdown.
    ///
    /// While stopped this sets the default for future sessions. While active
    /// it replaces the current target, and while running it additionally
    /// restarts the countdown window: elapsed time resets to zero against
    /// the new value.
    pub fn set_time_left(&mut self, seconds: u64) {
        match self.state() {
            SessionState::Stopped => self.default_duration = seconds,
            SessionState::Paused => self.target_duration = seconds,
            SessionState::Running => {
                self.target_duration = seconds;
                self.start_time = Some(Instant::now());
            }
        }
    }

    /// Finalize the in-flight workout record and return to stopped.
    pub fn finish(&mut self) {
        if let Some(started) = self.workout_started.take() {
            let record = WorkoutRecord::close(started, SystemTime::now());
            info!("workout finished after {} s", record.duration_s());
            self.log.append(record);
        }
        self.start_time = None;
        self.pause_time = None;
        self.target_duration = self.default_duration;
    }

    /// Seconds left on the countdown. While stopped this is the default
    /// duration; while paused the frozen remainder; while running it counts
    /// down and may go briefly negative before the ticker stops the session.
    pub fn time_left_s(&self) -> i64 {
        let target = self.target_duration as i64;
        match (self.start_time, self.pause_time) {
            (None, _) => self.default_duration as i64,
            (Some(start), Some(paused_at)) => target - round_secs(paused_at - start),
            (Some(start), None) => target - round_secs(start.elapsed()),
        }
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }
}

fn round_secs(elapsed: Duration) -> i64 {
    (elapsed.as_secs_f64() + 0.5).floor() as i64
}

/// The session/actuator pair, mutated as one unit.
///
/// There is exactly one controller per process, built at startup and shared
/// behind an `Arc<Mutex<_>>`: transport handlers and the ticker serialize
/// through that lock, which is what makes the blocking ramp safe (at most
/// one ramp in flight, never interleaved with a stop).
pub struct Controller<T: Treadmill> {
    session: WorkoutSession,
    treadmill: T,
    bus: Arc<SnapshotBus>,
}

impl<T: Treadmill> Controller<T> {
    pub fn new(session: WorkoutSession, treadmill: T, bus: Arc<SnapshotBus>) -> Self {
        Self {
            session,
            treadmill,
            bus,
        }
    }

    /// Change the treadmill speed, blocking for the whole ramp.
    ///
    /// A nonzero target while stopped starts a fresh session first. Zero
    /// pauses the session once the belt has ramped down; a nonzero target
    /// while paused resumes it. The target must be 0 or within
    /// [`MIN_SPEED`](crate::actuator::MIN_SPEED)..=[`MAX_SPEED`](crate::actuator::MAX_SPEED);
    /// transports validate before calling.
    pub fn set_speed(&mut self, target: u16) -> Result<(), HardwareError> {
        if target > 0 && self.session.state() == SessionState::Stopped {
            self.session.start();
        }
        self.treadmill.set_speed(target)?;
        if target == 0 {
            self.session.pause();
        } else {
            self.session.resume();
        }
        self.publish();
        Ok(())
    }

    /// See [`WorkoutSession::set_time_left`].
    pub fn set_time_left(&mut self, seconds: u64) {
        self.session.set_time_left(seconds);
        self.publish();
    }

    /// Stop the session: ramp the belt down, record the workout, reset the
    /// countdown to the default. Valid from any state; a no-op while stopped.
    pub fn stop(&mut self) -> Result<(), HardwareError> {
        if self.session.state() == SessionState::Stopped {
            return Ok(());
        }
        self.treadmill.set_speed(0)?;
        self.session.finish();
        info!("session stopped");
        self.publish();
        Ok(())
    }

    /// Pure read; never mutates session or actuator state.
    pub fn snapshot(&self) -> WorkoutSnapshot {
        WorkoutSnapshot {
            state: self.session.state(),
            time_left_s: self.session.time_left_s(),
            speed: self.treadmill.current_speed(),
            completed_sessions: self.session.log().completed(),
            recent_sessions: self.session.log().recent(SessionLog::DEFAULT_RECENT),
        }
    }

    /// One ticker period: finalize an expired session, otherwise push a
    /// snapshot so subscribers see the countdown move. Nothing to do unless
    /// running.
    pub fn tick(&mut self) -> Result<(), HardwareError> {
        if self.session.state() != SessionState::Running {
            return Ok(());
        }
        if self.session.time_left_s() <= 0 {
            self.stop()
        } else {
            self.publish();
            Ok(())
        }
    }

    /// Push the current snapshot to all subscribers.
    pub fn publish(&self) {
        self.bus.publish(self.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::SimulatedTreadmill;
    use std::thread;

    fn controller(default_s: u64) -> Controller<SimulatedTreadmill> {
        let mut treadmill = SimulatedTreadmill::new();
        treadmill.init().unwrap();
        Controller::new(
            WorkoutSession::new(default_s),
            treadmill,
            Arc::new(SnapshotBus::new()),
        )
    }

    #[test]
    fn stopped_session_reports_the_default_duration() {
        let c = controller(300);
        let snap = c.snapshot();
        assert_eq!(snap.state, SessionState::Stopped);
        assert_eq!(snap.time_left_s, 300);
        assert_eq!(snap.speed, 0);
        assert!(snap.recent_sessions.is_empty());
    }

    #[test]
    fn nonzero_speed_while_stopped_starts_a_session() {
        let mut c = controller(300);
        c.set_speed(20).unwrap();
        let snap = c.snapshot();
        assert_eq!(snap.state, SessionState::Running);
        assert_eq!(snap.speed, 20);
        assert_eq!(snap.time_left_s, 300);
    }

    #[test]
    fn zero_speed_pauses_and_nonzero_resumes() {
        let mut c = controller(300);
        c.set_speed(20).unwrap();
        c.set_speed(0).unwrap();
        assert_eq!(c.snapshot().state, SessionState::Paused);

        c.set_speed(25).unwrap();
        let snap = c.snapshot();
        assert_eq!(snap.state, SessionState::Running);
        assert_eq!(snap.speed, 25);
    }

    #[test]
    fn pausing_does_not_consume_budget() {
        let mut c = controller(300);
        c.set_speed(20).unwrap();
        c.set_speed(0).unwrap();
        let frozen = c.snapshot().time_left_s;

        // The countdown must not move while paused.
        thread::sleep(Duration::from_millis(1200));
        assert_eq!(c.snapshot().time_left_s, frozen);

        c.set_speed(20).unwrap();
        assert_eq!(c.snapshot().time_left_s, frozen);
    }

    #[test]
    fn countdown_tracks_wall_clock_while_running() {
        let mut c = controller(300);
        c.set_speed(20).unwrap();
        thread::sleep(Duration::from_millis(1100));
        let left = c.snapshot().time_left_s;
        assert!((298..=299).contains(&left), "time left was {left}");
    }

    #[test]
    fn set_time_left_while_running_restarts_the_window() {
        let mut c = controller(300);
        c.set_speed(20).unwrap();
        thread::sleep(Duration::from_millis(1100));
        c.set_time_left(10);
        // Elapsed resets to zero against the new target.
        assert_eq!(c.snapshot().time_left_s, 10);
    }

    #[test]
    fn set_time_left_while_stopped_changes_the_default() {
        let mut c = controller(300);
        c.set_time_left(600);
        assert_eq!(c.snapshot().time_left_s, 600);
        c.set_speed(20).unwrap();
        assert_eq!(c.snapshot().time_left_s, 600);
    }

    #[test]
    fn stop_records_exactly_one_workout_and_resets() {
        let mut c = controller(300);
        c.set_speed(20).unwrap();
        thread::sleep(Duration::from_millis(50));
        c.stop().unwrap();

        let snap = c.snapshot();
        assert_eq!(snap.state, SessionState::Stopped);
        assert_eq!(snap.time_left_s, 300);
        assert_eq!(snap.speed, 0);
        assert_eq!(snap.completed_sessions, 1);
        assert_eq!(snap.recent_sessions.len(), 1);
    }

    #[test]
    fn stop_while_stopped_is_a_no_op() {
        let mut c = controller(300);
        c.stop().unwrap();
        assert_eq!(c.snapshot().completed_sessions, 0);
    }

    #[test]
    fn workout_duration_spans_start_to_stop_including_pauses() {
        let mut c = controller(300);
        c.set_speed(20).unwrap();
        thread::sleep(Duration::from_millis(600));
        c.set_speed(0).unwrap();
        thread::sleep(Duration::from_millis(600));
        c.stop().unwrap();

        // Wall-clock duration, pause included, is about 1.2 s; the record
        // keeps whole seconds.
        let record = c.snapshot().recent_sessions[0];
        assert!(record.duration_s() <= 2);
        assert!(record.ended_unix_s >= record.started_unix_s);
    }

    #[test]
    fn expired_session_is_finalized_by_tick() {
        let mut c = controller(1);
        c.set_speed(20).unwrap();
        thread::sleep(Duration::from_millis(1600));
        c.tick().unwrap();

        let snap = c.snapshot();
        assert_eq!(snap.state, SessionState::Stopped);
        assert_eq!(snap.time_left_s, 1);
        assert_eq!(snap.completed_sessions, 1);
    }

    #[test]
    fn tick_is_inert_unless_running() {
        let mut c = controller(1);
        c.tick().unwrap();
        assert_eq!(c.snapshot().state, SessionState::Stopped);

        c.set_speed(20).unwrap();
        c.set_speed(0).unwrap();
        c.set_time_left(0);
        c.tick().unwrap();
        // Expired target, but paused sessions are never auto-stopped.
        assert_eq!(c.snapshot().state, SessionState::Paused);
    }

    #[test]
    fn snapshot_serializes_with_lowercase_state() {
        let c = controller(300);
        let json = serde_json::to_value(c.snapshot()).unwrap();
        assert_eq!(json["state"], "stopped");
        assert_eq!(json["time_left_s"], 300);
    }
}
