use std::sync::Arc;

use crate::protocol::{ErrorCode, ServerMessage};

use super::SignalingServer;

impl SignalingServer {
    /// Close every session that has been silent for longer than the alive
    /// timeout. Each expired peer is told why before its channel is dropped.
    pub fn expire_idle_sessions(&self) -> usize {
        let alive_timeout = self.config.alive_timeout;
        let mut expired = 0;

        for (peer_id, session_id) in self.sessions.collect_expired(alive_timeout) {
            let Some(session) = self.sessions.close_idle(&peer_id, session_id, alive_timeout)
            else {
                continue;
            };
            expired += 1;
            self.metrics.increment_expired_sessions();
            let _ = session
                .sender
                .try_send(Arc::new(ServerMessage::error(ErrorCode::SessionExpired)));
            tracing::info!(mount = %self.mount.name, %peer_id, %session_id, "Expired idle session");
        }

        expired
    }

    /// Periodic sweep for idle sessions. Runs until the task is dropped.
    pub async fn maintenance_task(&self) {
        let mut interval = tokio::time::interval(self.config.cleanup_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let expired = self.expire_idle_sessions();
            if expired > 0 {
                tracing::debug!(mount = %self.mount.name, expired, "Maintenance sweep finished");
            }
        }
    }
}
