use std::sync::Arc;

use tracing::{debug, trace};

use crate::metrics::ServerMetrics;
use crate::protocol::{RelayMessage, ServerMessage};

use super::session_manager::SessionManager;
use super::{RelayError, SessionError};

/// Forwards relay frames to the live session of their destination.
///
/// Delivery is a single non-blocking attempt; nothing is buffered for peers
/// that are not connected.
pub(crate) struct RelayDispatcher {
    sessions: Arc<SessionManager>,
    metrics: Arc<ServerMetrics>,
}

impl RelayDispatcher {
    pub fn new(sessions: Arc<SessionManager>, metrics: Arc<ServerMetrics>) -> Self {
        Self { sessions, metrics }
    }

    pub fn relay(&self, message: RelayMessage) -> Result<(), RelayError> {
        if message.from_peer_id == message.to_peer_id {
            return Err(RelayError::SelfAddressed);
        }

        let from = message.from_peer_id.clone();
        let to = message.to_peer_id.clone();
        let kind = message.kind.clone();

        match self
            .sessions
            .send(&to, Arc::new(ServerMessage::Relay(message)))
        {
            Ok(()) => {
                self.metrics.increment_messages_relayed();
                trace!(%from, %to, %kind, "Relayed frame");
                Ok(())
            }
            Err(SessionError::Transport(peer_id)) => Err(RelayError::Transport(peer_id)),
            Err(_) => {
                self.metrics.increment_relay_misses();
                debug!(%from, %to, %kind, "Relay destination not connected");
                Err(RelayError::NotFound(to))
            }
        }
    }
}
