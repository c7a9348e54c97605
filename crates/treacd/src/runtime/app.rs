use crate::hal_i2c::LinuxSmBus;
use crate::runtime::config::RuntimeConfig;
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use std::sync::{atomic::AtomicBool, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::info;
use tread_core::{
    run_ticker, Controller, HardwareError, PwmTreadmill, SimulatedTreadmill, SnapshotBus,
    TickerConfig, Treadmill, WorkoutSession,
};
use tread_io::{run_bridge, serve_http, BridgeConfig, HttpConfig};

enum TreacMotor {
    Simulated(SimulatedTreadmill),
    Pwm(PwmTreadmill<LinuxSmBus>),
}

impl Treadmill for TreacMotor {
    fn init(&mut self) -> Result<(), HardwareError> {
        match self {
            Self::Simulated(t) => t.init(),
            Self::Pwm(t) => t.init(),
        }
    }

    fn set_speed(&mut self, target: u16) -> Result<(), HardwareError> {
        match self {
            Self::Simulated(t) => t.set_speed(target),
            Self::Pwm(t) => t.set_speed(target),
        }
    }

    fn current_speed(&self) -> u16 {
        match self {
            Self::Simulated(t) => t.current_speed(),
            Self::Pwm(t) => t.current_speed(),
        }
    }
}

pub fn run_from_args() {
    let config = RuntimeConfig::from_env();
    if config.show_help {
        RuntimeConfig::print_help();
        return;
    }
    run(config);
}

pub fn run(config: RuntimeConfig) {
    init_tracing(config.json_logs);
    telemetry::init();

    let mut treadmill = if config.fake_treadmill {
        info!("Using simulated treadmill");
        TreacMotor::Simulated(SimulatedTreadmill::new())
    } else {
        info!(
            bus = config.i2c_bus,
            addr = config.i2c_addr,
            "Connecting to PWM controller"
        );
        let bus = LinuxSmBus::open(config.i2c_bus, config.i2c_addr)
            .expect("Failed to open the I2C bus");
        TreacMotor::Pwm(PwmTreadmill::new(bus))
    };
    treadmill
        .init()
        .expect("Failed to initialize the treadmill");

    let bus = Arc::new(SnapshotBus::new());
    let controller = Arc::new(Mutex::new(Controller::new(
        WorkoutSession::new(config.default_workout_s),
        treadmill,
        Arc::clone(&bus),
    )));
    // Seed the cache so the first subscriber sees a state before any command.
    controller.lock().unwrap().publish();

    let stop = Arc::new(AtomicBool::new(false));

    info!(
        default_workout_s = config.default_workout_s,
        "Starting session ticker"
    );
    let ticker_handle = {
        let controller = Arc::clone(&controller);
        let stop = Arc::clone(&stop);
        thread::spawn(move || run_ticker(controller, TickerConfig::default(), stop))
    };

    let bridge_handle = if config.bridge_enabled {
        let controller = Arc::clone(&controller);
        let bus = Arc::clone(&bus);
        let stop = Arc::clone(&stop);
        let bridge_config = BridgeConfig {
            bind_addr: config.bridge_addr.clone(),
        };
        info!(addr = %bridge_config.bind_addr, "Starting bridge");
        Some(thread::spawn(move || {
            run_bridge(controller, bus, bridge_config, stop)
        }))
    } else {
        info!("Bridge disabled");
        None
    };

    let _http_handle = serve_http(
        Arc::clone(&controller),
        HttpConfig {
            bind_addr: config.bind_addr.clone(),
            html_dir: config.html_dir.clone(),
        },
    );

    let _telemetry_handle = telemetry::start_metrics_updater(Arc::clone(&bus), Arc::clone(&stop));

    info!("treacd running");

    if let Some(seconds) = config.run_seconds {
        info!(seconds, "Running for limited duration");
        thread::sleep(Duration::from_secs(seconds));
        stop.store(true, std::sync::atomic::Ordering::Relaxed);

        let _ = ticker_handle.join();
        if let Some(handle) = bridge_handle {
            let _ = handle.join();
        }
        info!("Run complete");
    } else {
        let _ = ticker_handle.join();
        if let Some(handle) = bridge_handle {
            let _ = handle.join();
        }
    }
}
