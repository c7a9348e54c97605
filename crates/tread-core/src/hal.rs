use thiserror::Error;

/// Errors surfaced by the hardware bus.
///
/// A failed register access almost always means a wiring or power fault on
/// the I2C side, not a transient condition, so there is no retry anywhere in
/// the core: the in-progress operation aborts and the error propagates.
#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("failed to open bus device {device}: {msg}")]
    Open { device: String, msg: String },

    #[error("bus write to register {reg:#04x} failed: {msg}")]
    Write { reg: u8, msg: String },

    #[error("bus read from register {reg:#04x} failed: {msg}")]
    Read { reg: u8, msg: String },
}

/// Byte-addressed register bus (SMBus byte-data protocol).
///
/// The PWM controller is programmed exclusively through single-byte register
/// reads and writes, so this is the whole seam between the driver and the
/// platform. The real implementation lives in the daemon crate; tests use an
/// in-memory register map.
pub trait SmBus: Send {
    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), HardwareError>;
    fn read_reg(&mut self, reg: u8) -> Result<u8, HardwareError>;
}
