//! Prometheus metrics for the treadmill daemon.

use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::LazyLock;

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Current belt speed in tenths of km/h
pub static TREADMILL_SPEED: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        "treac_treadmill_speed_tenth_kmh",
        "Current belt speed in tenths of km/h",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Seconds left on the workout countdown
pub static TIME_LEFT_S: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        "treac_session_time_left_seconds",
        "Seconds left on the workout countdown",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Session state (0=stopped, 1=running, 2=paused)
pub static SESSION_STATE: LazyLock<IntGauge> = LazyLock::new(|| {
    let gauge = IntGauge::new(
        "treac_session_state",
        "Session state (0=stopped, 1=running, 2=paused)",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Workouts completed since startup
pub static SESSIONS_COMPLETED: LazyLock<IntGauge> = LazyLock::new(|| {
    let gauge = IntGauge::new(
        "treac_sessions_completed",
        "Workouts completed since startup",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Connected bridge subscribers
pub static BRIDGE_CLIENTS: LazyLock<IntGauge> = LazyLock::new(|| {
    let gauge = IntGauge::new("treac_bridge_clients", "Connected bridge subscribers").unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Commands rejected by transport validation
pub static COMMANDS_REJECTED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "treac_commands_rejected_total",
        "Commands rejected by transport validation",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Hardware bus failures surfaced to a transport
pub static HARDWARE_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "treac_hardware_errors_total",
        "Hardware bus failures surfaced to a transport",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Encode every registered metric in the text exposition format.
pub fn encode_metrics() -> Result<Vec<u8>, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(buffer)
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = TREADMILL_SPEED.get();
    let _ = TIME_LEFT_S.get();
    let _ = SESSION_STATE.get();
    let _ = SESSIONS_COMPLETED.get();
    let _ = BRIDGE_CLIENTS.get();
    let _ = COMMANDS_REJECTED.get();
    let _ = HARDWARE_ERRORS.get();
}
