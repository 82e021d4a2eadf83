//! Per-mount signaling configuration.
//!
//! A mount is one independent presence registry + session table served under
//! its own path prefixes, so a meeting UI and a screen-share addon can share
//! a process without sharing peers.

use super::defaults::{
    default_allow_discovery, default_duplicate_peer_policy, default_index_message,
    default_max_peer_id_length, default_mount_name, default_signaling_key,
    default_signaling_prefix,
};
use serde::{Deserialize, Serialize};

/// What to do when a connecting peer asks for an id that a live session holds.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePeerPolicy {
    /// Refuse the new connection with `ID-TAKEN`, unless it presents the live
    /// session's token (a reconnect), in which case it replaces that session.
    #[default]
    Reject,
    /// Always evict the live session and install the new one.
    Replace,
}

/// Configuration for one signaling mount point.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MountConfig {
    /// Name used in logs and metrics
    #[serde(default = "default_mount_name")]
    pub name: String,
    /// Prefix for the presence HTTP routes (`/register/...`, `/broadcasters`, ...).
    /// Empty string mounts them at the root.
    #[serde(default)]
    pub http_prefix: String,
    /// Prefix for the signaling socket (`{prefix}/peerjs`) and the `{prefix}/{key}/...` routes
    #[serde(default = "default_signaling_prefix")]
    pub signaling_prefix: String,
    /// Key clients must present when opening the signaling socket
    #[serde(default = "default_signaling_key")]
    pub key: String,
    /// Expose the list of connected peer ids at `{prefix}/{key}/peers`
    #[serde(default = "default_allow_discovery")]
    pub allow_discovery: bool,
    /// Collision handling for client-chosen peer ids
    #[serde(default = "default_duplicate_peer_policy")]
    pub duplicate_peer_policy: DuplicatePeerPolicy,
    /// Maximum length of a client-chosen peer id
    #[serde(default = "default_max_peer_id_length")]
    pub max_peer_id_length: usize,
    /// Message returned by the index route
    #[serde(default = "default_index_message")]
    pub index_message: String,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            name: default_mount_name(),
            http_prefix: String::new(),
            signaling_prefix: default_signaling_prefix(),
            key: default_signaling_key(),
            allow_discovery: default_allow_discovery(),
            duplicate_peer_policy: default_duplicate_peer_policy(),
            max_peer_id_length: default_max_peer_id_length(),
            index_message: default_index_message(),
        }
    }
}

impl MountConfig {
    /// Join a route suffix onto the HTTP prefix.
    pub fn http_route(&self, suffix: &str) -> String {
        join_route(&self.http_prefix, suffix)
    }

    /// Join a route suffix onto the signaling prefix.
    pub fn signaling_route(&self, suffix: &str) -> String {
        join_route(&self.signaling_prefix, suffix)
    }
}

/// Concrete route paths served by one mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRoutes {
    pub index: String,
    pub register_broadcaster: String,
    pub register_receiver: String,
    pub broadcasters: String,
    pub unregister: String,
    pub generate_id: String,
    pub peers: String,
    pub socket: String,
}

impl MountRoutes {
    pub fn all(&self) -> [&str; 8] {
        [
            &self.index,
            &self.register_broadcaster,
            &self.register_receiver,
            &self.broadcasters,
            &self.unregister,
            &self.generate_id,
            &self.peers,
            &self.socket,
        ]
    }
}

impl MountConfig {
    pub fn routes(&self) -> MountRoutes {
        MountRoutes {
            index: self.http_route(""),
            register_broadcaster: self.http_route("/register/broadcaster"),
            register_receiver: self.http_route("/register/receiver"),
            broadcasters: self.http_route("/broadcasters"),
            unregister: self.http_route("/unregister"),
            generate_id: self.signaling_route(&format!("/{}/id", self.key)),
            peers: self.signaling_route(&format!("/{}/peers", self.key)),
            socket: self.signaling_route("/peerjs"),
        }
    }
}

fn join_route(prefix: &str, suffix: &str) -> String {
    match (prefix.is_empty(), suffix.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => suffix.to_string(),
        (false, _) => format!("{prefix}{suffix}"),
    }
}
