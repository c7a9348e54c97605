use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tread_core::{SessionState, SnapshotBus};
use tread_io::metrics::{
    init_metrics, SESSIONS_COMPLETED, SESSION_STATE, TIME_LEFT_S, TREADMILL_SPEED,
};

pub fn init() {
    init_metrics();
}

/// Mirror the latest snapshot into the metrics gauges on a fixed cadence.
/// Reads the cached snapshot only, never the controller lock, so a long
/// ramp cannot stall metrics scrapes.
pub fn start_metrics_updater(
    bus: Arc<SnapshotBus>,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            if let Some(snapshot) = bus.latest() {
                TREADMILL_SPEED.set(f64::from(snapshot.speed));
                TIME_LEFT_S.set(snapshot.time_left_s as f64);
                SESSION_STATE.set(match snapshot.state {
                    SessionState::Stopped => 0,
                    SessionState::Running => 1,
                    SessionState::Paused => 2,
                });
                SESSIONS_COMPLETED.set(snapshot.completed_sessions as i64);
            }
            thread::sleep(Duration::from_millis(200));
        }
    })
}
