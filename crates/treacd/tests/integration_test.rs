use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command};
use std::thread;
use std::time::{Duration, Instant};

struct TreacProcess {
    child: Child,
    bridge_addr: String,
}

impl TreacProcess {
    fn start() -> Self {
        let bin_path = std::env::var("CARGO_BIN_EXE_treacd").unwrap_or_else(|_| {
            let candidates = [
                "../../target/release/treacd",
                "target/release/treacd",
                "./target/release/treacd",
                "../../target/debug/treacd",
                "target/debug/treacd",
                "./target/debug/treacd",
            ];
            for candidate in candidates {
                if std::path::Path::new(candidate).exists() {
                    return candidate.to_string();
                }
            }
            panic!(
                "Failed to locate treacd binary. Expected CARGO_BIN_EXE_treacd or a build in target/{{release,debug}}/treacd."
            );
        });

        let bridge_addr = ephemeral_addr();
        let http_addr = ephemeral_addr();

        let child = Command::new(&bin_path)
            .args([
                "--fake",
                "--bind",
                &http_addr,
                "--bridge-bind",
                &bridge_addr,
                "--duration",
                "300",
            ])
            .spawn()
            .expect("Failed to start treacd");

        // Loop until the bridge port is open (up to 5s)
        let start = Instant::now();
        while start.elapsed().as_secs() < 5 {
            if TcpStream::connect(&bridge_addr).is_ok() {
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }

        Self { child, bridge_addr }
    }

    fn connect(&self) -> (TcpStream, BufReader<TcpStream>) {
        let stream = TcpStream::connect(&self.bridge_addr).expect("Failed to connect to bridge");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        (stream, reader)
    }
}

impl Drop for TreacProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

fn ephemeral_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind ephemeral port");
    let addr = listener.local_addr().expect("Failed to resolve address");
    drop(listener);
    format!("127.0.0.1:{}", addr.port())
}

fn read_state(reader: &mut BufReader<TcpStream>) -> serde_json::Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("bridge read");
    serde_json::from_str(&line).expect("state line should be JSON")
}

/// Read state lines until `pred` holds or the deadline passes.
fn wait_for_state(
    reader: &mut BufReader<TcpStream>,
    pred: impl Fn(&serde_json::Value) -> bool,
) -> serde_json::Value {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let state = read_state(reader);
        if pred(&state) {
            return state;
        }
        assert!(Instant::now() < deadline, "timed out waiting, last: {state}");
    }
}

#[test]
fn new_subscriber_receives_the_current_state() {
    let treac = TreacProcess::start();
    let (_stream, mut reader) = treac.connect();

    let state = read_state(&mut reader);
    assert_eq!(state["type"], "state");
    assert_eq!(state["state"], "stopped");
    assert_eq!(state["time_left_s"], 300);
    assert_eq!(state["speed"], 0);
}

#[test]
fn change_speed_starts_a_session_and_stop_records_it() {
    let treac = TreacProcess::start();
    let (mut stream, mut reader) = treac.connect();
    let _ = read_state(&mut reader);

    writeln!(stream, r#"{{"type":"change-speed","speed":25}}"#).unwrap();
    let running = wait_for_state(&mut reader, |s| s["state"] == "running");
    assert_eq!(running["speed"], 25);

    writeln!(stream, r#"{{"type":"stop"}}"#).unwrap();
    let stopped = wait_for_state(&mut reader, |s| s["state"] == "stopped");
    assert_eq!(stopped["speed"], 0);
    assert_eq!(stopped["completed_sessions"], 1);
    assert_eq!(stopped["time_left_s"], 300);
    assert_eq!(stopped["recent_sessions"].as_array().unwrap().len(), 1);
}

#[test]
fn change_timer_while_stopped_sets_the_default() {
    let treac = TreacProcess::start();
    let (mut stream, mut reader) = treac.connect();
    let _ = read_state(&mut reader);

    writeln!(stream, r#"{{"type":"change-timer","seconds":900}}"#).unwrap();
    let state = wait_for_state(&mut reader, |s| s["time_left_s"] == 900);
    assert_eq!(state["state"], "stopped");
}

#[test]
fn zero_speed_pauses_the_running_session() {
    let treac = TreacProcess::start();
    let (mut stream, mut reader) = treac.connect();
    let _ = read_state(&mut reader);

    writeln!(stream, r#"{{"type":"change-speed","speed":20}}"#).unwrap();
    wait_for_state(&mut reader, |s| s["state"] == "running");

    writeln!(stream, r#"{{"type":"change-speed","speed":0}}"#).unwrap();
    let paused = wait_for_state(&mut reader, |s| s["state"] == "paused");
    assert_eq!(paused["speed"], 0);
}
