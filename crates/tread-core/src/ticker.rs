//! Fixed-period session poll.
//!
//! The ticker is the sole driver of automatic session termination: once per
//! period it locks the controller, finalizes an expired session or pushes a
//! snapshot. The period is fixed, with no jitter correction; a ramp holding
//! the controller lock simply delays the tick, so the period is a lower
//! bound on responsiveness, not a guarantee.

use crate::actuator::Treadmill;
use crate::session::Controller;
use log::warn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TickerConfig {
    pub period: Duration,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
        }
    }
}

pub fn run_ticker<T: Treadmill>(
    controller: Arc<Mutex<Controller<T>>>,
    config: TickerConfig,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(config.period);
        if stop.load(Ordering::Relaxed) {
            break;
        }
        let mut controller = controller.lock().unwrap();
        if let Err(err) = controller.tick() {
            // The session state is already consistent; the belt is wherever
            // the failed ramp left it.
            warn!("tick failed to stop the session: {err}");
        }
    }
}
