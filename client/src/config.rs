//! Client runtime configuration.

use shared::{HEARTBEAT_INTERVAL, INPUT_SEND_INTERVAL, RECV_TIMEOUT};
use std::time::Duration;

/// Give up on a CONNECT that has not been answered after this long.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub player_id: String,
    pub player_name: String,
    pub heartbeat_interval: Duration,
    /// Minimum spacing between two INPUT packets.
    pub input_interval: Duration,
    pub recv_timeout: Duration,
    pub connect_timeout: Duration,
}

impl ClientConfig {
    pub fn new(player_id: impl Into<String>, player_name: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            player_name: player_name.into(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            input_interval: INPUT_SEND_INTERVAL,
            recv_timeout: RECV_TIMEOUT,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}
