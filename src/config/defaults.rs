//! Default value functions for configuration fields.
//!
//! Used by serde's `#[serde(default = ...)]` attributes throughout the
//! configuration system, grouped by section.

use super::logging::LogFormat;
use super::mount::{DuplicatePeerPolicy, MountConfig};
use crate::protocol::DEFAULT_MAX_PEER_ID_LENGTH;

// =============================================================================
// Port & Root Config
// =============================================================================

pub const fn default_port() -> u16 {
    9000
}

pub fn default_mounts() -> Vec<MountConfig> {
    vec![MountConfig::default()]
}

// =============================================================================
// Mount Defaults
// =============================================================================

pub fn default_mount_name() -> String {
    "peerjs".to_string()
}

pub fn default_signaling_prefix() -> String {
    "/peerjs".to_string()
}

pub fn default_signaling_key() -> String {
    "peerjs".to_string()
}

pub const fn default_allow_discovery() -> bool {
    true
}

pub const fn default_duplicate_peer_policy() -> DuplicatePeerPolicy {
    DuplicatePeerPolicy::Reject
}

pub const fn default_max_peer_id_length() -> usize {
    DEFAULT_MAX_PEER_ID_LENGTH
}

pub fn default_index_message() -> String {
    "PeerJS Signaling Server".to_string()
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "peer-relay.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Text
}

// =============================================================================
// Security Defaults
// =============================================================================

pub fn default_cors_origins() -> String {
    "*".to_string()
}

pub const fn default_require_metrics_auth() -> bool {
    false
}

pub const fn default_max_message_size() -> usize {
    65536 // 64KB, comfortably above a full SDP offer
}

pub const fn default_max_connections_per_ip() -> usize {
    32
}

// =============================================================================
// WebSocket Defaults
// =============================================================================

pub const fn default_alive_timeout_secs() -> u64 {
    60 // PeerJS clients heartbeat every 5 seconds
}

pub const fn default_cleanup_interval_secs() -> u64 {
    5
}

pub const fn default_outbound_queue_capacity() -> usize {
    64
}
