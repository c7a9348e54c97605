//! Treadmill speed actuators.
//!
//! Speeds are integer tenths of km/h throughout. The real actuator never
//! jumps to a target speed: it walks there one tenth at a time with a fixed
//! delay per step, so `set_speed` blocks its caller for up to
//! `|target - current| * step_delay` (several seconds for a full ramp).

use crate::hal::{HardwareError, SmBus};
use crate::pwm::{Pca9685, PWM_STEPS};
use std::thread;
use std::time::Duration;

/// The motor stalls below 1.0 km/h.
pub const MIN_SPEED: u16 = 10;
/// The belt is rated up to 8.0 km/h.
pub const MAX_SPEED: u16 = 80;

/// The control pulse is a fixed 0.2 ms longer than the speed it encodes
/// (a 1.0 km/h command needs a 1.2 ms pulse), so 2 tenths are added before
/// converting to ticks.
const SPEED_OFFSET: u16 = 2;

const SPEED_INCREMENT: i32 = 1;
const SPEED_INCREMENT_DELAY: Duration = Duration::from_millis(100);

/// A 9 ms cycle is what the motor controller expects; 98 Hz gets closest.
const REFRESH_HZ: u16 = 98;

/// 1 ms of pulse per 1 km/h, against the 9 ms cycle, speeds in tenths.
const PULSE_FACTOR: f64 = 1.0 / 9.0 / 10.0;

/// The drive channel on the PWM controller.
const DRIVE_CHANNEL: u8 = 0;

/// Capability shared by the real and the simulated treadmill.
///
/// `set_speed` is a blocking hardware operation on the real actuator, not an
/// instantaneous state change, and must not be called concurrently: at most
/// one ramp may be in flight per actuator (callers serialize through the
/// controller lock).
pub trait Treadmill: Send {
    fn init(&mut self) -> Result<(), HardwareError>;
    fn set_speed(&mut self, target: u16) -> Result<(), HardwareError>;
    fn current_speed(&self) -> u16;
}

/// No-op actuator for tests and for running the daemon off the hardware.
#[derive(Debug, Default)]
pub struct SimulatedTreadmill {
    speed: u16,
}

impl SimulatedTreadmill {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Treadmill for SimulatedTreadmill {
    fn init(&mut self) -> Result<(), HardwareError> {
        self.speed = 0;
        Ok(())
    }

    fn set_speed(&mut self, target: u16) -> Result<(), HardwareError> {
        assert!(valid_target(target), "speed {target} out of range");
        self.speed = target;
        Ok(())
    }

    fn current_speed(&self) -> u16 {
        self.speed
    }
}

/// The real belt drive behind a PCA9685.
pub struct PwmTreadmill<B: SmBus> {
    pwm: Pca9685<B>,
    speed: u16,
    step_delay: Duration,
}

impl<B: SmBus> PwmTreadmill<B> {
    pub fn new(bus: B) -> Self {
        Self {
            pwm: Pca9685::new(bus),
            speed: 0,
            step_delay: SPEED_INCREMENT_DELAY,
        }
    }

    /// Override the per-step ramp delay. Tests run ramps with a zero delay;
    /// production keeps the 100 ms default.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }
}

impl<B: SmBus> Treadmill for PwmTreadmill<B> {
    fn init(&mut self) -> Result<(), HardwareError> {
        self.pwm.open()?;
        self.pwm.set_frequency(REFRESH_HZ)?;
        Ok(())
    }

    /// Ramp to `target`, one tenth of km/h per step.
    ///
    /// Blocks the calling thread for the whole ramp. On a bus failure the
    /// ramp aborts and `current_speed` stays at the last speed that was
    /// actually written to the chip.
    fn set_speed(&mut self, target: u16) -> Result<(), HardwareError> {
        assert!(valid_target(target), "speed {target} out of range");

        let increment = if target < self.speed {
            -SPEED_INCREMENT
        } else {
            SPEED_INCREMENT
        };

        while self.speed != target {
            thread::sleep(self.step_delay);
            let mut next = (i32::from(self.speed) + increment) as u16;
            // The band below MIN_SPEED is mechanically invalid; don't dwell
            // in it. Snap up to the floor when accelerating, down to a full
            // stop when decelerating.
            if next < MIN_SPEED {
                next = if increment > 0 { MIN_SPEED } else { 0 };
            }
            self.pwm
                .set_channel(DRIVE_CHANNEL, 0, pulse_ticks(next))?;
            self.speed = next;
        }
        Ok(())
    }

    fn current_speed(&self) -> u16 {
        self.speed
    }
}

fn valid_target(target: u16) -> bool {
    target == 0 || (MIN_SPEED..=MAX_SPEED).contains(&target)
}

/// Pulse length in PWM ticks for a speed in tenths of km/h.
fn pulse_ticks(speed: u16) -> u16 {
    let pulse = f64::from(speed + SPEED_OFFSET) * PULSE_FACTOR * f64::from(PWM_STEPS);
    (pulse + 0.5).floor() as u16
}
