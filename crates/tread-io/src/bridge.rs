//! TCP pub/sub bridge.
//!
//! Clients connect, receive the current state snapshot as one JSON line,
//! and from then on every published snapshot. Inbound lines are commands
//! translated into controller calls; the controller lock serializes them
//! against the ticker and any in-flight ramp, so a command may block for
//! the duration of a ramp before it is applied.

use crate::metrics::{BRIDGE_CLIENTS, COMMANDS_REJECTED, HARDWARE_ERRORS};
use crate::protocol::{CommandMsg, StateMsg};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use tread_core::{Controller, SnapshotBus, Treadmill, MAX_SPEED, MIN_SPEED};

pub struct BridgeConfig {
    pub bind_addr: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7070".to_string(),
        }
    }
}

struct BridgeClient {
    stream: TcpStream,
    recv_buf: Vec<u8>,
    addr: String,
}

pub fn run_bridge<T: Treadmill>(
    controller: Arc<Mutex<Controller<T>>>,
    bus: Arc<SnapshotBus>,
    config: BridgeConfig,
    stop: Arc<AtomicBool>,
) {
    let listener = TcpListener::bind(&config.bind_addr)
        .unwrap_or_else(|e| panic!("Failed to bind {}: {}", config.bind_addr, e));
    listener
        .set_nonblocking(true)
        .expect("Failed to set nonblocking");

    info!(addr = %config.bind_addr, "Bridge listening");

    let snapshots = bus.subscribe();
    let mut clients: Vec<BridgeClient> = Vec::new();

    loop {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        // Accept new subscribers and hand them the current state.
        match listener.accept() {
            Ok((stream, addr)) => {
                info!(client_addr = %addr, "Bridge client connected");
                stream
                    .set_nonblocking(true)
                    .expect("Failed to set nonblocking on client");
                let mut client = BridgeClient {
                    stream,
                    recv_buf: Vec::with_capacity(1024),
                    addr: addr.to_string(),
                };
                let initial = bus
                    .latest()
                    .unwrap_or_else(|| controller.lock().unwrap().snapshot());
                if client.stream.write_all(&StateMsg::new(&initial).to_line()).is_ok() {
                    clients.push(client);
                    BRIDGE_CLIENTS.set(clients.len() as i64);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(err) => {
                warn!("Bridge accept error: {}", err);
            }
        }

        // Read commands.
        let mut dropped = Vec::new();
        for (idx, client) in clients.iter_mut().enumerate() {
            let mut temp = [0u8; 1024];
            match client.stream.read(&mut temp) {
                Ok(0) => {
                    info!(client_addr = %client.addr, "Bridge client disconnected");
                    dropped.push(idx);
                }
                Ok(n) => {
                    client.recv_buf.extend_from_slice(&temp[..n]);
                    while let Some(pos) = client.recv_buf.iter().position(|b| *b == b'\n') {
                        let line = client.recv_buf.drain(..=pos).collect::<Vec<u8>>();
                        if let Ok(text) = std::str::from_utf8(&line) {
                            let trimmed = text.trim();
                            if trimmed.is_empty() {
                                continue;
                            }
                            match CommandMsg::parse(trimmed) {
                                Some(cmd) => apply_command(cmd, &controller),
                                None => {
                                    warn!(line = trimmed, "Unparseable bridge command");
                                    COMMANDS_REJECTED.inc();
                                }
                            }
                        }
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    warn!(client_addr = %client.addr, error = %err, "Bridge read error");
                    dropped.push(idx);
                }
            }
        }

        // Fan published snapshots out to every subscriber.
        while let Ok(snapshot) = snapshots.try_recv() {
            let line = StateMsg::new(&snapshot).to_line();
            for (idx, client) in clients.iter_mut().enumerate() {
                if dropped.contains(&idx) {
                    continue;
                }
                // A full kernel buffer means a consumer that stopped
                // reading; drop it rather than track partial lines.
                if let Err(err) = client.stream.write_all(&line) {
                    warn!(client_addr = %client.addr, error = %err, "Bridge write error");
                    dropped.push(idx);
                }
            }
        }

        if !dropped.is_empty() {
            dropped.sort_unstable();
            dropped.dedup();
            for idx in dropped.into_iter().rev() {
                clients.remove(idx);
            }
            BRIDGE_CLIENTS.set(clients.len() as i64);
        }

        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Whether a requested speed is one the actuator accepts.
pub fn valid_speed(speed: u16) -> bool {
    speed == 0 || (MIN_SPEED..=MAX_SPEED).contains(&speed)
}

fn apply_command<T: Treadmill>(cmd: CommandMsg, controller: &Mutex<Controller<T>>) {
    match cmd {
        CommandMsg::ChangeSpeed { speed } => {
            if !valid_speed(speed) {
                warn!(speed, "Rejected out-of-range speed");
                COMMANDS_REJECTED.inc();
                return;
            }
            let mut controller = controller.lock().unwrap();
            if speed == controller.snapshot().speed {
                debug!(speed, "Speed unchanged, skipping ramp");
                return;
            }
            debug!(speed, "Changing speed");
            if let Err(err) = controller.set_speed(speed) {
                warn!(error = %err, "Speed change failed");
                HARDWARE_ERRORS.inc();
            }
        }
        CommandMsg::ChangeTimer { seconds } => {
            debug!(seconds, "Changing timer");
            controller.lock().unwrap().set_time_left(seconds);
        }
        CommandMsg::Stop => {
            debug!("Stopping session");
            if let Err(err) = controller.lock().unwrap().stop() {
                warn!(error = %err, "Stop failed");
                HARDWARE_ERRORS.inc();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tread_core::{SessionState, SimulatedTreadmill, WorkoutSession};

    fn controller() -> (Arc<Mutex<Controller<SimulatedTreadmill>>>, Arc<SnapshotBus>) {
        let bus = Arc::new(SnapshotBus::new());
        let mut treadmill = SimulatedTreadmill::new();
        treadmill.init().unwrap();
        let controller =
            Controller::new(WorkoutSession::new(300), treadmill, Arc::clone(&bus));
        (Arc::new(Mutex::new(controller)), bus)
    }

    #[test]
    fn change_speed_command_starts_and_drives() {
        let (controller, _bus) = controller();
        apply_command(CommandMsg::ChangeSpeed { speed: 20 }, &controller);
        let snap = controller.lock().unwrap().snapshot();
        assert_eq!(snap.state, SessionState::Running);
        assert_eq!(snap.speed, 20);
    }

    #[test]
    fn out_of_range_speed_leaves_state_unchanged() {
        let (controller, _bus) = controller();
        apply_command(CommandMsg::ChangeSpeed { speed: 81 }, &controller);
        apply_command(CommandMsg::ChangeSpeed { speed: 5 }, &controller);
        let snap = controller.lock().unwrap().snapshot();
        assert_eq!(snap.state, SessionState::Stopped);
        assert_eq!(snap.speed, 0);
    }

    #[test]
    fn stop_command_finalizes_the_session() {
        let (controller, _bus) = controller();
        apply_command(CommandMsg::ChangeSpeed { speed: 20 }, &controller);
        apply_command(CommandMsg::Stop, &controller);
        let snap = controller.lock().unwrap().snapshot();
        assert_eq!(snap.state, SessionState::Stopped);
        assert_eq!(snap.completed_sessions, 1);
    }

    #[test]
    fn timer_command_updates_the_countdown() {
        let (controller, _bus) = controller();
        apply_command(CommandMsg::ChangeTimer { seconds: 60 }, &controller);
        assert_eq!(controller.lock().unwrap().snapshot().time_left_s, 60);
    }
}
