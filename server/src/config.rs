//! Server runtime configuration.

use shared::{DEFAULT_PORT, HEARTBEAT_TIMEOUT, MAX_PLAYERS, RECV_TIMEOUT, SWEEP_INTERVAL};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the UDP socket binds to, e.g. `0.0.0.0:5555`.
    pub bind_addr: String,
    /// Connections accepted before CONNECT is rejected.
    pub max_players: usize,
    /// Silence after which a connection is evicted.
    pub heartbeat_timeout: Duration,
    /// How often the eviction sweep runs.
    pub sweep_interval: Duration,
    /// Upper bound on one blocking receive, and so on shutdown latency.
    pub recv_timeout: Duration,
}

impl ServerConfig {
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            max_players: MAX_PLAYERS,
            heartbeat_timeout: HEARTBEAT_TIMEOUT,
            sweep_interval: SWEEP_INTERVAL,
            recv_timeout: RECV_TIMEOUT,
        }
    }
}
