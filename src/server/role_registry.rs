use std::sync::Arc;

use dashmap::DashSet;
use tracing::debug;

use crate::metrics::ServerMetrics;
use crate::protocol::{PeerId, Role};

use super::session_manager::SessionObserver;

/// Outcome of [`RoleRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterOutcome {
    /// False when the peer already held the role.
    pub inserted: bool,
    /// Broadcaster snapshot taken after the insert; only filled for receivers.
    pub broadcasters: Option<Vec<PeerId>>,
}

/// Presence registry of broadcaster and receiver peer ids.
///
/// Membership is independent of session liveness: a peer may be registered
/// without a signaling socket, and entries are only removed by
/// [`RoleRegistry::unregister`] or a session teardown.
pub struct RoleRegistry {
    broadcasters: DashSet<PeerId>,
    receivers: DashSet<PeerId>,
    metrics: Arc<ServerMetrics>,
    mount: String,
}

impl RoleRegistry {
    pub fn new(mount: impl Into<String>, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            broadcasters: DashSet::new(),
            receivers: DashSet::new(),
            metrics,
            mount: mount.into(),
        }
    }

    fn members(&self, role: Role) -> &DashSet<PeerId> {
        match role {
            Role::Broadcaster => &self.broadcasters,
            Role::Receiver => &self.receivers,
        }
    }

    pub fn register(&self, role: Role, peer_id: &str) -> RegisterOutcome {
        let inserted = self.members(role).insert(peer_id.to_string());
        if inserted {
            self.metrics.increment_registrations();
        }
        debug!(mount = %self.mount, %peer_id, %role, inserted, "Peer registered");

        let broadcasters = match role {
            Role::Receiver => Some(self.list(Role::Broadcaster)),
            Role::Broadcaster => None,
        };
        RegisterOutcome {
            inserted,
            broadcasters,
        }
    }

    /// Remove `peer_id` from both roles. Returns true if it held either.
    pub fn unregister(&self, peer_id: &str) -> bool {
        let was_broadcaster = self.broadcasters.remove(peer_id).is_some();
        let was_receiver = self.receivers.remove(peer_id).is_some();
        let removed = was_broadcaster || was_receiver;
        if removed {
            self.metrics.increment_unregistrations();
            debug!(mount = %self.mount, %peer_id, "Peer unregistered");
        }
        removed
    }

    /// Unordered snapshot of the peers holding `role`.
    pub fn list(&self, role: Role) -> Vec<PeerId> {
        self.members(role).iter().map(|id| id.key().clone()).collect()
    }

    pub fn contains(&self, role: Role, peer_id: &str) -> bool {
        self.members(role).contains(peer_id)
    }
}

impl SessionObserver for RoleRegistry {
    fn on_peer_disconnected(&self, peer_id: &str) {
        self.unregister(peer_id);
    }
}
