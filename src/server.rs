use crate::config::{Config, MountConfig};
use crate::metrics::ServerMetrics;
use crate::protocol::{ErrorCode, PeerId, Role, ServerMessage, SessionId};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Duration;

mod maintenance;
mod message_router;
mod relay;
mod role_registry;
mod session_manager;

use relay::RelayDispatcher;
use session_manager::{SessionLimits, SessionManager};

pub use role_registry::{RegisterOutcome, RoleRegistry};
pub use session_manager::{ConnectRequest, SessionObserver, SessionState};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid peer id: {0}")]
    InvalidPeerId(String),
    #[error("ID `{0}` is taken")]
    DuplicatePeerId(PeerId),
    #[error("Too many connections from your IP ({current}/{limit})")]
    TooManyConnections { current: usize, limit: usize },
    #[error("peer `{0}` is not connected")]
    NotFound(PeerId),
    #[error("transport to peer `{0}` failed")]
    Transport(PeerId),
}

impl SessionError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidPeerId(_) => ErrorCode::InvalidPeerId,
            Self::DuplicatePeerId(_) => ErrorCode::DuplicatePeerId,
            Self::TooManyConnections { .. } => ErrorCode::TooManyConnections,
            Self::NotFound(_) => ErrorCode::PeerNotFound,
            Self::Transport(_) => ErrorCode::InternalError,
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("peer `{0}` is not connected")]
    NotFound(PeerId),
    #[error("transport to peer `{0}` failed")]
    Transport(PeerId),
    #[error("cannot relay a frame to its own sender")]
    SelfAddressed,
}

/// Runtime settings shared by every mount of a process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub alive_timeout: Duration,
    pub cleanup_interval: Duration,
    pub outbound_queue_capacity: usize,
    pub max_message_size: usize,
    pub max_connections_per_ip: usize,
    pub require_metrics_auth: bool,
    pub metrics_auth_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ServerConfig {
    fn from(config: &Config) -> Self {
        Self {
            alive_timeout: Duration::from_secs(config.websocket.alive_timeout_secs),
            cleanup_interval: Duration::from_secs(config.websocket.cleanup_interval_secs.max(1)),
            outbound_queue_capacity: config.websocket.outbound_queue_capacity.max(1),
            max_message_size: config.security.max_message_size,
            max_connections_per_ip: config.security.max_connections_per_ip,
            require_metrics_auth: config.security.require_metrics_auth,
            metrics_auth_token: config.security.metrics_auth_token.clone(),
        }
    }
}

/// One signaling mount: a presence registry, the live session table and the
/// relay dispatcher between them.
pub struct SignalingServer {
    mount: MountConfig,
    config: ServerConfig,
    sessions: Arc<SessionManager>,
    registry: Arc<RoleRegistry>,
    dispatcher: RelayDispatcher,
    pub(crate) metrics: Arc<ServerMetrics>,
}

impl SignalingServer {
    pub fn new(mount: MountConfig, config: ServerConfig, metrics: Arc<ServerMetrics>) -> Arc<Self> {
        let registry = Arc::new(RoleRegistry::new(mount.name.clone(), metrics.clone()));
        let limits = SessionLimits {
            max_connections_per_ip: config.max_connections_per_ip,
            max_peer_id_length: mount.max_peer_id_length,
            duplicate_peer_policy: mount.duplicate_peer_policy,
        };
        let sessions = Arc::new(SessionManager::new(
            mount.name.clone(),
            limits,
            metrics.clone(),
            registry.clone(),
        ));
        let dispatcher = RelayDispatcher::new(sessions.clone(), metrics.clone());

        Arc::new(Self {
            mount,
            config,
            sessions,
            registry,
            dispatcher,
            metrics,
        })
    }

    pub fn mount(&self) -> &MountConfig {
        &self.mount
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.metrics
    }

    /// Open a session and greet it with `OPEN`.
    ///
    /// A session displaced by this one is sent `SESSION_REPLACED` and its
    /// outbound channel dropped, which ends its writer task.
    pub fn connect(&self, request: ConnectRequest) -> Result<SessionId, SessionError> {
        let peer_id = request.peer_id.clone();
        let opened = self.sessions.open(request)?;

        if let Some(evicted) = opened.evicted {
            let notice = Arc::new(ServerMessage::error(ErrorCode::SessionReplaced));
            if evicted.sender.try_send(notice).is_err() {
                tracing::debug!(
                    mount = %self.mount.name,
                    %peer_id,
                    session_id = %evicted.session_id,
                    "Replaced session was already gone"
                );
            }
        }

        self.sessions
            .send(&peer_id, Arc::new(ServerMessage::Open))?;
        self.sessions.activate(&peer_id, opened.session_id);
        Ok(opened.session_id)
    }

    /// Tear down a session. Returns false when the session was already gone
    /// or has been replaced.
    pub fn disconnect(&self, peer_id: &str, session_id: SessionId) -> bool {
        self.sessions.close(peer_id, session_id).is_some()
    }

    pub fn is_connected(&self, peer_id: &str) -> bool {
        self.sessions.contains(peer_id)
    }

    pub fn session_state(&self, peer_id: &str) -> Option<SessionState> {
        self.sessions.state(peer_id)
    }

    /// Live peer ids, for discovery.
    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.sessions.peer_ids()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn register(&self, role: Role, peer_id: &str) -> RegisterOutcome {
        self.registry.register(role, peer_id)
    }

    pub fn unregister(&self, peer_id: &str) -> bool {
        self.registry.unregister(peer_id)
    }

    pub fn list(&self, role: Role) -> Vec<PeerId> {
        self.registry.list(role)
    }

    /// Send an `ERROR` frame to a live peer.
    pub fn send_error(&self, peer_id: &str, error_code: ErrorCode, message: impl Into<String>) {
        let frame = ServerMessage::Error {
            message: message.into(),
            error_code,
        };
        if let Err(err) = self.sessions.send(peer_id, Arc::new(frame)) {
            tracing::debug!(mount = %self.mount.name, %peer_id, error = %err, "Failed to deliver error frame");
        }
    }
}
