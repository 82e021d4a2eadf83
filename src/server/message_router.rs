use std::sync::Arc;

use crate::protocol::{
    parse_client_message, ClientMessage, ErrorCode, FrameError, OutboundRelay, RelayKind,
    ServerMessage, SessionId,
};

use super::{RelayError, SignalingServer};

impl SignalingServer {
    /// Validate one text frame from a connected peer and act on it.
    ///
    /// Rejected frames are answered with an `ERROR` frame and never reach the
    /// relay dispatcher.
    pub fn handle_text_frame(&self, peer_id: &str, session_id: SessionId, text: &str) {
        let max = self.config.max_message_size;
        let parsed = if text.len() > max {
            Err(FrameError::TooLarge {
                size: text.len(),
                max,
            })
        } else {
            parse_client_message(text)
        };

        match parsed {
            Ok(message) => self.handle_client_message(peer_id, session_id, message),
            Err(err) => {
                self.metrics.increment_malformed_frames();
                tracing::warn!(
                    mount = %self.mount.name,
                    %peer_id,
                    %session_id,
                    error = %err,
                    "Rejected signaling frame"
                );
                if self.sessions.session_id(peer_id) == Some(session_id) {
                    self.send_error(peer_id, err.error_code(), err.to_string());
                }
            }
        }
    }

    /// Handle a validated client message.
    pub fn handle_client_message(
        &self,
        peer_id: &str,
        session_id: SessionId,
        message: ClientMessage,
    ) {
        if !self.sessions.touch(peer_id, session_id) {
            tracing::debug!(
                mount = %self.mount.name,
                %peer_id,
                %session_id,
                "Dropping frame from a session that is no longer live"
            );
            return;
        }

        match message {
            ClientMessage::Heartbeat => {
                self.metrics.increment_heartbeats();
            }
            ClientMessage::Relay(outbound) => {
                self.handle_relay(peer_id, outbound);
            }
        }
    }

    fn handle_relay(&self, peer_id: &str, outbound: OutboundRelay) {
        let kind = outbound.kind.clone();
        match self.dispatcher.relay(outbound.from_peer(peer_id.to_string())) {
            Ok(()) => {}
            Err(RelayError::NotFound(missing)) => {
                // Teardown frames to a peer that is already gone need no reply.
                if matches!(kind, RelayKind::Leave | RelayKind::Expire) {
                    return;
                }
                let notice = ServerMessage::Expire {
                    src: missing,
                    dst: peer_id.to_string(),
                };
                if let Err(err) = self.sessions.send(peer_id, Arc::new(notice)) {
                    tracing::debug!(mount = %self.mount.name, %peer_id, error = %err, "Failed to deliver EXPIRE");
                }
            }
            Err(RelayError::SelfAddressed) => {
                self.send_error(
                    peer_id,
                    ErrorCode::SelfAddressed,
                    ErrorCode::SelfAddressed.description(),
                );
            }
            Err(RelayError::Transport(dst)) => {
                tracing::debug!(
                    mount = %self.mount.name,
                    from = %peer_id,
                    to = %dst,
                    %kind,
                    "Relay destination dropped during delivery"
                );
            }
        }
    }
}
