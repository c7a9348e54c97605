//! PCA9685 16-channel PWM controller driver.
//!
//! The chip is programmed over a byte-addressed bus: mode registers, a
//! prescaler for the output frequency and four on/off tick registers per
//! channel. Tick values are 12 bit (0..4096).

use crate::hal::{HardwareError, SmBus};
use std::thread;
use std::time::Duration;

const MODE1: u8 = 0x00;
const MODE2: u8 = 0x01;
const PRESCALE: u8 = 0xFE;
const LED0_ON_L: u8 = 0x06;
const LED0_ON_H: u8 = 0x07;
const LED0_OFF_L: u8 = 0x08;
const LED0_OFF_H: u8 = 0x09;
const ALL_LED_ON_L: u8 = 0xFA;
const ALL_LED_ON_H: u8 = 0xFB;
const ALL_LED_OFF_L: u8 = 0xFC;
const ALL_LED_OFF_H: u8 = 0xFD;

const SLEEP: u8 = 0x10;
const RESTART: u8 = 0x80;
const ALLCALL: u8 = 0x01;
const OUTDRV: u8 = 0x04;

/// Internal oscillator of the PCA9685.
const OSC_CLOCK_HZ: f64 = 25_000_000.0;

/// PWM resolution in ticks per cycle.
pub const PWM_STEPS: u16 = 4096;

/// Oscillator settle time after any MODE1 change that touches it.
const SETTLE: Duration = Duration::from_millis(5);

pub struct Pca9685<B: SmBus> {
    bus: B,
}

impl<B: SmBus> Pca9685<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Initialize the device: all outputs off, totem-pole driver mode,
    /// then wake it from sleep. Leaves the chip actively driving.
    pub fn open(&mut self) -> Result<(), HardwareError> {
        self.set_all_channels(0, 0)?;
        self.bus.write_reg(MODE2, OUTDRV)?;
        self.bus.write_reg(MODE1, ALLCALL)?;
        thread::sleep(SETTLE);

        let mode1 = self.bus.read_reg(MODE1)?;
        self.bus.write_reg(MODE1, mode1 & !SLEEP)?;
        thread::sleep(SETTLE);
        Ok(())
    }

    /// Program the output frequency.
    ///
    /// The prescaler may only be written while the oscillator sleeps;
    /// writing it on an active chip is undefined. Sleep, write, restore,
    /// settle, then set the restart bit.
    pub fn set_frequency(&mut self, freq_hz: u16) -> Result<(), HardwareError> {
        let prescale = prescale_for(freq_hz);

        let oldmode = self.bus.read_reg(MODE1)?;
        self.bus.write_reg(MODE1, (oldmode & !RESTART) | SLEEP)?;
        self.bus.write_reg(PRESCALE, prescale)?;
        self.bus.write_reg(MODE1, oldmode)?;
        thread::sleep(SETTLE);
        self.bus.write_reg(MODE1, oldmode | RESTART)?;
        Ok(())
    }

    /// Set the on/off ticks of a single channel. Both values must fit in
    /// 12 bits; that is the caller's contract and is not re-checked here.
    pub fn set_channel(&mut self, channel: u8, on: u16, off: u16) -> Result<(), HardwareError> {
        self.bus.write_reg(LED0_ON_L + 4 * channel, (on & 0xFF) as u8)?;
        self.bus.write_reg(LED0_ON_H + 4 * channel, (on >> 8) as u8)?;
        self.bus.write_reg(LED0_OFF_L + 4 * channel, (off & 0xFF) as u8)?;
        self.bus.write_reg(LED0_OFF_H + 4 * channel, (off >> 8) as u8)?;
        Ok(())
    }

    /// Set every channel at once through the broadcast registers.
    pub fn set_all_channels(&mut self, on: u16, off: u16) -> Result<(), HardwareError> {
        self.bus.write_reg(ALL_LED_ON_L, (on & 0xFF) as u8)?;
        self.bus.write_reg(ALL_LED_ON_H, (on >> 8) as u8)?;
        self.bus.write_reg(ALL_LED_OFF_L, (off & 0xFF) as u8)?;
        self.bus.write_reg(ALL_LED_OFF_H, (off >> 8) as u8)?;
        Ok(())
    }
}

fn prescale_for(freq_hz: u16) -> u8 {
    let exact = OSC_CLOCK_HZ / f64::from(PWM_STEPS) / f64::from(freq_hz) - 1.0;
    (exact + 0.5).floor() as u8
}
