pub mod bridge;
pub mod http;
pub mod metrics;
pub mod protocol;

pub use bridge::{run_bridge, valid_speed, BridgeConfig};
pub use http::{serve_http, HttpConfig};
pub use metrics::{encode_metrics, init_metrics};
pub use protocol::{CommandMsg, StateMsg};
