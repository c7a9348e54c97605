use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub run_seconds: Option<u64>,
    pub bind_addr: String,
    pub bridge_addr: String,
    pub bridge_enabled: bool,
    pub fake_treadmill: bool,
    pub i2c_bus: u8,
    pub i2c_addr: u16,
    pub default_workout_s: u64,
    pub html_dir: Option<PathBuf>,
    pub json_logs: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            run_seconds: None,
            bind_addr: "0.0.0.0:8080".to_string(),
            bridge_addr: "127.0.0.1:7070".to_string(),
            bridge_enabled: true,
            fake_treadmill: false,
            i2c_bus: 1,
            i2c_addr: 0x40,
            default_workout_s: tread_core::DEFAULT_WORKOUT_SECS,
            html_dir: None,
            json_logs: false,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Self {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--bind" => {
                    if i + 1 < args.len() {
                        cfg.bind_addr = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--bridge-bind" => {
                    if i + 1 < args.len() {
                        cfg.bridge_addr = args[i + 1].clone();
                        i += 1;
                    }
                }
                "--no-bridge" => {
                    cfg.bridge_enabled = false;
                }
                "--fake" => {
                    cfg.fake_treadmill = true;
                }
                "--i2c-bus" => {
                    if i + 1 < args.len() {
                        cfg.i2c_bus = args[i + 1].parse().unwrap_or(cfg.i2c_bus);
                        i += 1;
                    }
                }
                "--i2c-addr" => {
                    if i + 1 < args.len() {
                        cfg.i2c_addr = parse_addr(&args[i + 1]).unwrap_or(cfg.i2c_addr);
                        i += 1;
                    }
                }
                "--duration" => {
                    if i + 1 < args.len() {
                        cfg.default_workout_s =
                            args[i + 1].parse().unwrap_or(cfg.default_workout_s);
                        i += 1;
                    }
                }
                "--html-dir" => {
                    if i + 1 < args.len() {
                        cfg.html_dir = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--run-seconds" => {
                    if i + 1 < args.len() {
                        cfg.run_seconds = args[i + 1].parse::<u64>().ok();
                        i += 1;
                    }
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                _ => {}
            }
            i += 1;
        }
        cfg
    }

    pub fn print_help() {
        println!(
            r#"treacd - The Treadmill Controller

USAGE:
    treacd [OPTIONS]

OPTIONS:
    --bind <ADDR>          HTTP bind address [default: 0.0.0.0:8080]
    --bridge-bind <ADDR>   Pub/sub bridge TCP bind address [default: 127.0.0.1:7070]
    --no-bridge            Disable the pub/sub bridge
    --fake                 Use a simulated treadmill (no hardware access)
    --i2c-bus <N>          I2C bus number of the PWM controller [default: 1]
    --i2c-addr <ADDR>      I2C address of the PWM controller [default: 0x40]
    --duration <SECS>      Default workout duration in seconds [default: 1800]
    --html-dir <PATH>      Directory holding the web UI to serve
    --json-logs            Output logs in JSON format (for log aggregation)
    --run-seconds <SECS>   Run for a fixed duration then exit
    -h, --help             Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG               Set log filter (e.g., RUST_LOG=debug,treacd=trace)

EXAMPLES:
    # Run against the hardware with the bundled UI
    treacd --html-dir /usr/share/treac/html

    # Local development without a treadmill attached
    treacd --fake --bind 127.0.0.1:8080
"#
        );
    }
}

fn parse_addr(raw: &str) -> Option<u16> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else {
        raw.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("treacd")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_match_the_hardware_wiring() {
        let cfg = RuntimeConfig::from_args(&args(&[]));
        assert_eq!(cfg.i2c_bus, 1);
        assert_eq!(cfg.i2c_addr, 0x40);
        assert_eq!(cfg.default_workout_s, 1800);
        assert!(!cfg.fake_treadmill);
        assert!(cfg.bridge_enabled);
    }

    #[test]
    fn parses_overrides() {
        let cfg = RuntimeConfig::from_args(&args(&[
            "--fake",
            "--duration",
            "600",
            "--i2c-addr",
            "0x41",
            "--bridge-bind",
            "127.0.0.1:9000",
            "--no-bridge",
        ]));
        assert!(cfg.fake_treadmill);
        assert_eq!(cfg.default_workout_s, 600);
        assert_eq!(cfg.i2c_addr, 0x41);
        assert_eq!(cfg.bridge_addr, "127.0.0.1:9000");
        assert!(!cfg.bridge_enabled);
    }

    #[test]
    fn i2c_address_accepts_hex_and_decimal() {
        assert_eq!(parse_addr("0x40"), Some(0x40));
        assert_eq!(parse_addr("64"), Some(64));
        assert_eq!(parse_addr("zz"), None);
    }
}
