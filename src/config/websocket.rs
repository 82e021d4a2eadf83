//! Signaling socket configuration types.

use super::defaults::{
    default_alive_timeout_secs, default_cleanup_interval_secs, default_outbound_queue_capacity,
};
use serde::{Deserialize, Serialize};

/// WebSocket configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebSocketConfig {
    /// Sessions with no inbound frame for this long are expired (seconds)
    #[serde(default = "default_alive_timeout_secs")]
    pub alive_timeout_secs: u64,
    /// Interval between expiry sweeps (seconds)
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// Capacity of each session's outbound queue; a full queue is a transport failure
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            alive_timeout_secs: default_alive_timeout_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
        }
    }
}

impl WebSocketConfig {
    /// Validate WebSocket configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.alive_timeout_secs < 5 {
            anyhow::bail!(
                "websocket.alive_timeout_secs must be at least 5 seconds (configured: {})",
                self.alive_timeout_secs
            );
        }
        if self.cleanup_interval_secs == 0 {
            anyhow::bail!("websocket.cleanup_interval_secs must be greater than zero");
        }
        if self.cleanup_interval_secs > self.alive_timeout_secs {
            anyhow::bail!(
                "websocket.cleanup_interval_secs ({}) must not exceed alive_timeout_secs ({})",
                self.cleanup_interval_secs,
                self.alive_timeout_secs
            );
        }
        if self.outbound_queue_capacity == 0 {
            anyhow::bail!("websocket.outbound_queue_capacity must be greater than zero");
        }
        Ok(())
    }
}
