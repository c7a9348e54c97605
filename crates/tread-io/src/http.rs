//! HTTP surface: the web UI, a direct speed endpoint, health and metrics.

use crate::bridge::valid_speed;
use crate::metrics::{encode_metrics, COMMANDS_REJECTED, HARDWARE_ERRORS};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use tiny_http::{Header, Response, Server};
use tracing::{info, warn};
use tread_core::{Controller, Treadmill, MAX_SPEED};

pub struct HttpConfig {
    pub bind_addr: String,
    /// Directory holding the bundled web UI (index.html and assets).
    pub html_dir: Option<PathBuf>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            html_dir: None,
        }
    }
}

/// Start the HTTP server on its own thread.
pub fn serve_http<T: Treadmill + 'static>(
    controller: Arc<Mutex<Controller<T>>>,
    config: HttpConfig,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&config.bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start HTTP server on {}: {}", config.bind_addr, e);
                return;
            }
        };

        info!("HTTP server listening on http://{}/", config.bind_addr);

        for request in server.incoming_requests() {
            let path = request.url().to_string();

            if let Some(raw) = path.strip_prefix("/speed/") {
                let (body, status) = handle_speed(raw, &controller);
                let _ = request.respond(Response::from_string(body).with_status_code(status));
            } else if path == "/metrics" {
                match encode_metrics() {
                    Ok(buffer) => {
                        let response = Response::from_data(buffer).with_header(
                            Header::from_bytes(
                                &b"Content-Type"[..],
                                &b"text/plain; version=0.0.4"[..],
                            )
                            .unwrap(),
                        );
                        let _ = request.respond(response);
                    }
                    Err(e) => {
                        warn!("Failed to encode metrics: {}", e);
                        let _ = request.respond(
                            Response::from_string("Internal Server Error").with_status_code(500),
                        );
                    }
                }
            } else if path == "/health" {
                let _ = request.respond(Response::from_string("OK"));
            } else if path == "/" {
                respond_file(request, config.html_dir.as_deref(), "index.html");
            } else if let Some(filename) = path.strip_prefix("/static/") {
                if filename.contains('/') || filename.contains("..") {
                    let _ = request
                        .respond(Response::from_string("Not Found").with_status_code(404));
                } else {
                    let filename = filename.to_string();
                    respond_file(request, config.html_dir.as_deref(), &filename);
                }
            } else {
                let _ = request.respond(Response::from_string("Not Found").with_status_code(404));
            }
        }
    })
}

/// `GET /speed/<n>` — set the belt speed directly. The ramp blocks this
/// request until the belt reaches the target.
fn handle_speed<T: Treadmill>(
    raw: &str,
    controller: &Mutex<Controller<T>>,
) -> (String, u16) {
    let speed: u16 = match raw.parse() {
        Ok(s) => s,
        Err(_) => {
            COMMANDS_REJECTED.inc();
            return (format!("Not a speed: {raw}\n"), 400);
        }
    };
    if speed > MAX_SPEED {
        COMMANDS_REJECTED.inc();
        return (format!("Speed can't be higher than {MAX_SPEED}\n"), 400);
    }
    if !valid_speed(speed) {
        COMMANDS_REJECTED.inc();
        return (format!("Speed {speed} is below the minimum\n"), 400);
    }

    match controller.lock().unwrap().set_speed(speed) {
        Ok(()) => (format!("New speed: {speed}\n"), 200),
        Err(err) => {
            warn!(error = %err, "Speed change failed");
            HARDWARE_ERRORS.inc();
            (format!("Hardware error: {err}\n"), 500)
        }
    }
}

fn respond_file(request: tiny_http::Request, html_dir: Option<&Path>, filename: &str) {
    let Some(dir) = html_dir else {
        let _ = request.respond(Response::from_string("Not Found").with_status_code(404));
        return;
    };
    match std::fs::File::open(dir.join(filename)) {
        Ok(file) => {
            let mut response = Response::from_file(file);
            if let Some(content_type) = content_type_for(filename) {
                response = response.with_header(
                    Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()).unwrap(),
                );
            }
            let _ = request.respond(response);
        }
        Err(_) => {
            let _ = request.respond(Response::from_string("Not Found").with_status_code(404));
        }
    }
}

fn content_type_for(filename: &str) -> Option<&'static str> {
    let ext = Path::new(filename).extension()?.to_str()?;
    match ext {
        "html" => Some("text/html; charset=utf-8"),
        "js" => Some("application/javascript"),
        "css" => Some("text/css"),
        "png" => Some("image/png"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tread_core::{SessionState, SimulatedTreadmill, SnapshotBus, WorkoutSession};

    fn controller() -> Mutex<Controller<SimulatedTreadmill>> {
        let mut treadmill = SimulatedTreadmill::new();
        treadmill.init().unwrap();
        Mutex::new(Controller::new(
            WorkoutSession::new(300),
            treadmill,
            Arc::new(SnapshotBus::new()),
        ))
    }

    #[test]
    fn speed_endpoint_applies_a_valid_speed() {
        let controller = controller();
        let (body, status) = handle_speed("25", &controller);
        assert_eq!(status, 200);
        assert_eq!(body, "New speed: 25\n");
        assert_eq!(controller.lock().unwrap().snapshot().speed, 25);
    }

    #[test]
    fn speed_endpoint_rejects_overspeed_without_touching_state() {
        let controller = controller();
        let (body, status) = handle_speed("81", &controller);
        assert_eq!(status, 400);
        assert!(body.contains("80"));
        let snap = controller.lock().unwrap().snapshot();
        assert_eq!(snap.state, SessionState::Stopped);
        assert_eq!(snap.speed, 0);
    }

    #[test]
    fn speed_endpoint_rejects_sub_minimum_and_garbage() {
        let controller = controller();
        assert_eq!(handle_speed("5", &controller).1, 400);
        assert_eq!(handle_speed("fast", &controller).1, 400);
        assert_eq!(handle_speed("-1", &controller).1, 400);
    }

    #[test]
    fn zero_speed_is_accepted() {
        let controller = controller();
        handle_speed("20", &controller);
        let (_, status) = handle_speed("0", &controller);
        assert_eq!(status, 200);
        assert_eq!(
            controller.lock().unwrap().snapshot().state,
            SessionState::Paused
        );
    }

    #[test]
    fn content_types_cover_the_bundled_assets() {
        assert!(content_type_for("app.js").is_some());
        assert_eq!(content_type_for("index.html"), Some("text/html; charset=utf-8"));
        assert_eq!(content_type_for("README"), None);
    }
}
