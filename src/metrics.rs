use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Process-wide counters for the signaling server. One instance is shared by
/// every mount.
#[derive(Debug)]
pub struct ServerMetrics {
    // Connection metrics
    pub total_connections: AtomicU64,
    pub active_connections: AtomicU64,
    pub disconnections: AtomicU64,
    pub rejected_connections: AtomicU64,
    pub duplicate_peer_ids: AtomicU64,
    pub replaced_sessions: AtomicU64,
    pub expired_sessions: AtomicU64,

    // Relay metrics
    pub messages_relayed: AtomicU64,
    pub relay_misses: AtomicU64,
    pub transport_failures: AtomicU64,
    pub malformed_frames: AtomicU64,
    pub heartbeats: AtomicU64,

    // Presence registry metrics
    pub registrations: AtomicU64,
    pub unregistrations: AtomicU64,

    started_at: Instant,
}

/// Point-in-time view of [`ServerMetrics`], served as JSON at `/metrics`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub relay: RelayMetrics,
    pub registry: RegistryMetrics,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectionMetrics {
    pub total_connections: u64,
    pub active_connections: u64,
    pub disconnections: u64,
    pub rejected_connections: u64,
    pub duplicate_peer_ids: u64,
    pub replaced_sessions: u64,
    pub expired_sessions: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RelayMetrics {
    pub messages_relayed: u64,
    pub relay_misses: u64,
    pub transport_failures: u64,
    pub malformed_frames: u64,
    pub heartbeats: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistryMetrics {
    pub registrations: u64,
    pub unregistrations: u64,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            disconnections: AtomicU64::new(0),
            rejected_connections: AtomicU64::new(0),
            duplicate_peer_ids: AtomicU64::new(0),
            replaced_sessions: AtomicU64::new(0),
            expired_sessions: AtomicU64::new(0),
            messages_relayed: AtomicU64::new(0),
            relay_misses: AtomicU64::new(0),
            transport_failures: AtomicU64::new(0),
            malformed_frames: AtomicU64::new(0),
            heartbeats: AtomicU64::new(0),
            registrations: AtomicU64::new(0),
            unregistrations: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn increment_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_active_connections(&self) {
        // fetch_update so a stray double-decrement cannot underflow
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_sub(1)
            });
        self.disconnections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected_connections(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_duplicate_peer_ids(&self) {
        self.duplicate_peer_ids.fetch_add(1, Ordering::Relaxed);
    }

    /// A session took over a live peer id. Counts as a new connection but
    /// leaves the active count and disconnections unchanged.
    pub fn record_replaced_session(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.replaced_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_expired_sessions(&self) {
        self.expired_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_messages_relayed(&self) {
        self.messages_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_relay_misses(&self) {
        self.relay_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transport_failures(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_malformed_frames(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_heartbeats(&self) {
        self.heartbeats.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_registrations(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_unregistrations(&self) {
        self.unregistrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: chrono::Utc::now(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            connections: ConnectionMetrics {
                total_connections: self.total_connections.load(Ordering::Relaxed),
                active_connections: self.active_connections.load(Ordering::Relaxed),
                disconnections: self.disconnections.load(Ordering::Relaxed),
                rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
                duplicate_peer_ids: self.duplicate_peer_ids.load(Ordering::Relaxed),
                replaced_sessions: self.replaced_sessions.load(Ordering::Relaxed),
                expired_sessions: self.expired_sessions.load(Ordering::Relaxed),
            },
            relay: RelayMetrics {
                messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
                relay_misses: self.relay_misses.load(Ordering::Relaxed),
                transport_failures: self.transport_failures.load(Ordering::Relaxed),
                malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
                heartbeats: self.heartbeats.load(Ordering::Relaxed),
            },
            registry: RegistryMetrics {
                registrations: self.registrations.load(Ordering::Relaxed),
                unregistrations: self.unregistrations.load(Ordering::Relaxed),
            },
        }
    }
}
