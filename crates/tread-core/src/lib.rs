pub mod actuator;
pub mod broadcast;
pub mod hal;
pub mod history;
pub mod pwm;
pub mod session;
pub mod ticker;

pub use actuator::{PwmTreadmill, SimulatedTreadmill, Treadmill, MAX_SPEED, MIN_SPEED};
pub use broadcast::SnapshotBus;
pub use hal::{HardwareError, SmBus};
pub use history::{SessionLog, WorkoutRecord};
pub use pwm::Pca9685;
pub use session::{Controller, SessionState, WorkoutSession, WorkoutSnapshot, DEFAULT_WORKOUT_SECS};
pub use ticker::{run_ticker, TickerConfig};
