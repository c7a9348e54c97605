//! Linux userspace I2C backend for the PWM controller.
//!
//! The PCA9685 hangs off the Pi's I2C bus (`/dev/i2c-1`, address 0x40 by
//! default) and only ever speaks the SMBus byte-data protocol.

use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;
use tracing::info;
use tread_core::{HardwareError, SmBus};

pub struct LinuxSmBus {
    dev: LinuxI2CDevice,
}

impl LinuxSmBus {
    pub fn open(busnum: u8, address: u16) -> Result<Self, HardwareError> {
        let device = format!("/dev/i2c-{busnum}");
        let dev = LinuxI2CDevice::new(&device, address).map_err(|e| HardwareError::Open {
            device: device.clone(),
            msg: e.to_string(),
        })?;
        info!(device = %device, address, "I2C bus open");
        Ok(Self { dev })
    }
}

impl SmBus for LinuxSmBus {
    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), HardwareError> {
        self.dev
            .smbus_write_byte_data(reg, value)
            .map_err(|e| HardwareError::Write {
                reg,
                msg: e.to_string(),
            })
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, HardwareError> {
        self.dev
            .smbus_read_byte_data(reg)
            .map_err(|e| HardwareError::Read {
                reg,
                msg: e.to_string(),
            })
    }
}
