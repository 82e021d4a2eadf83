use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DuplicatePeerPolicy;
use crate::metrics::ServerMetrics;
use crate::protocol::{validate_peer_id, PeerId, ServerMessage, SessionId};

use super::SessionError;

/// Lifecycle of one signaling session. `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Receives session teardown events. Called once per removed session, after
/// the session has left the map.
pub trait SessionObserver: Send + Sync {
    fn on_peer_disconnected(&self, peer_id: &str);
}

#[derive(Debug)]
pub(crate) struct PeerSession {
    pub peer_id: PeerId,
    pub session_id: SessionId,
    pub token: String,
    pub sender: mpsc::Sender<Arc<ServerMessage>>,
    pub connected_at: DateTime<Utc>,
    pub last_heartbeat: Instant,
    pub client_addr: SocketAddr,
    pub state: SessionState,
}

impl PeerSession {
    fn activate(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::Connected;
        }
    }

    fn mark_disconnected(&mut self) {
        self.state = SessionState::Disconnected;
    }
}

/// A connecting peer's request for a session.
#[derive(Debug)]
pub struct ConnectRequest {
    pub peer_id: PeerId,
    pub token: String,
    pub sender: mpsc::Sender<Arc<ServerMessage>>,
    pub client_addr: SocketAddr,
}

/// Per-mount admission rules.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionLimits {
    pub max_connections_per_ip: usize,
    pub max_peer_id_length: usize,
    pub duplicate_peer_policy: DuplicatePeerPolicy,
}

/// Result of a successful [`SessionManager::open`].
#[derive(Debug)]
pub(crate) struct OpenedSession {
    pub session_id: SessionId,
    /// The live session this one displaced, already removed from the map.
    pub evicted: Option<PeerSession>,
}

pub(crate) struct SessionManager {
    sessions: DashMap<PeerId, PeerSession>,
    connections_per_ip: DashMap<IpAddr, usize>,
    limits: SessionLimits,
    metrics: Arc<ServerMetrics>,
    observer: Arc<dyn SessionObserver>,
    mount: String,
}

impl SessionManager {
    pub fn new(
        mount: impl Into<String>,
        limits: SessionLimits,
        metrics: Arc<ServerMetrics>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            connections_per_ip: DashMap::new(),
            limits,
            metrics,
            observer,
            mount: mount.into(),
        }
    }

    /// Admit a new session for `request.peer_id`.
    ///
    /// On a collision the live session is replaced when the request carries
    /// its token or the mount policy is [`DuplicatePeerPolicy::Replace`];
    /// otherwise the request is refused with [`SessionError::DuplicatePeerId`].
    /// A replaced session is returned to the caller instead of being reported
    /// to the observer, since its peer id stays live.
    pub fn open(&self, request: ConnectRequest) -> Result<OpenedSession, SessionError> {
        let ConnectRequest {
            peer_id,
            token,
            sender,
            client_addr,
        } = request;

        validate_peer_id(&peer_id, self.limits.max_peer_id_length)
            .map_err(SessionError::InvalidPeerId)?;

        let ip = client_addr.ip();
        let session_id = Uuid::new_v4();
        let session = PeerSession {
            peer_id: peer_id.clone(),
            session_id,
            token,
            sender,
            connected_at: Utc::now(),
            last_heartbeat: Instant::now(),
            client_addr,
            state: SessionState::Connecting,
        };

        let evicted = match self.sessions.entry(peer_id.clone()) {
            Entry::Occupied(mut entry) => {
                let reconnect = entry.get().token == session.token;
                if !reconnect && self.limits.duplicate_peer_policy == DuplicatePeerPolicy::Reject {
                    drop(entry);
                    self.metrics.increment_duplicate_peer_ids();
                    info!(mount = %self.mount, %peer_id, %client_addr, "Peer id already taken");
                    return Err(SessionError::DuplicatePeerId(peer_id));
                }

                // The replacement inherits the evicted session's IP slot; a
                // slot is only taken when the address changes.
                let previous_ip = entry.get().client_addr.ip();
                if previous_ip != ip {
                    if let Err(current) = self.try_reserve_ip_slot(ip) {
                        drop(entry);
                        return Err(self.ip_limit_exceeded(ip, current));
                    }
                    self.release_ip_slot(previous_ip);
                }

                let mut previous = entry.insert(session);
                previous.mark_disconnected();
                Some(previous)
            }
            Entry::Vacant(entry) => {
                if let Err(current) = self.try_reserve_ip_slot(ip) {
                    drop(entry);
                    return Err(self.ip_limit_exceeded(ip, current));
                }
                entry.insert(session);
                None
            }
        };

        if let Some(previous) = &evicted {
            self.metrics.record_replaced_session();
            info!(
                mount = %self.mount,
                %peer_id,
                %session_id,
                replaced_session_id = %previous.session_id,
                "Session replaced"
            );
        } else {
            self.metrics.increment_connections();
            info!(mount = %self.mount, %peer_id, %session_id, %client_addr, "Session opened");
        }

        Ok(OpenedSession {
            session_id,
            evicted,
        })
    }

    fn ip_limit_exceeded(&self, ip: IpAddr, current: usize) -> SessionError {
        warn!(
            mount = %self.mount,
            %ip,
            current,
            max = self.limits.max_connections_per_ip,
            "IP connection limit exceeded"
        );
        self.metrics.increment_rejected_connections();
        SessionError::TooManyConnections {
            current,
            limit: self.limits.max_connections_per_ip,
        }
    }

    /// Move a session from `Connecting` to `Connected`.
    pub fn activate(&self, peer_id: &str, session_id: SessionId) -> bool {
        match self.sessions.get_mut(peer_id) {
            Some(mut session) if session.session_id == session_id => {
                session.activate();
                true
            }
            _ => false,
        }
    }

    /// Remove the session if `session_id` still owns `peer_id`. Returns the
    /// removed session exactly once; later calls for the same session get `None`.
    pub fn close(&self, peer_id: &str, session_id: SessionId) -> Option<PeerSession> {
        self.close_where(peer_id, |session| session.session_id == session_id)
    }

    /// Like [`SessionManager::close`], but only while the session is still
    /// idle past `alive_timeout`.
    pub fn close_idle(
        &self,
        peer_id: &str,
        session_id: SessionId,
        alive_timeout: Duration,
    ) -> Option<PeerSession> {
        self.close_where(peer_id, |session| {
            session.session_id == session_id && session.last_heartbeat.elapsed() > alive_timeout
        })
    }

    fn close_where<F>(&self, peer_id: &str, predicate: F) -> Option<PeerSession>
    where
        F: FnOnce(&PeerSession) -> bool,
    {
        let (_, mut session) = self
            .sessions
            .remove_if(peer_id, |_, session| predicate(session))?;
        let session_id = session.session_id;

        session.mark_disconnected();
        self.release_ip_slot(session.client_addr.ip());
        self.metrics.decrement_active_connections();
        self.observer.on_peer_disconnected(peer_id);

        let connected_for = Utc::now().signed_duration_since(session.connected_at);
        info!(
            mount = %self.mount,
            peer_id = %session.peer_id,
            %session_id,
            connected_secs = connected_for.num_seconds(),
            "Session closed"
        );
        Some(session)
    }

    /// Queue a message for the live session of `peer_id`.
    ///
    /// A closed or full outbound queue closes the session and returns
    /// [`SessionError::Transport`].
    pub fn send(&self, peer_id: &str, message: Arc<ServerMessage>) -> Result<(), SessionError> {
        let (sender, session_id) = match self.sessions.get(peer_id) {
            Some(session) => (session.sender.clone(), session.session_id),
            None => return Err(SessionError::NotFound(peer_id.to_string())),
        };

        match sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(err) => {
                let reason = match err {
                    TrySendError::Full(_) => "outbound queue full",
                    TrySendError::Closed(_) => "outbound channel closed",
                };
                warn!(mount = %self.mount, %peer_id, %session_id, reason, "Send failed; closing session");
                self.metrics.increment_transport_failures();
                self.close(peer_id, session_id);
                Err(SessionError::Transport(peer_id.to_string()))
            }
        }
    }

    /// Refresh the liveness timestamp of a session.
    pub fn touch(&self, peer_id: &str, session_id: SessionId) -> bool {
        match self.sessions.get_mut(peer_id) {
            Some(mut session) if session.session_id == session_id => {
                session.last_heartbeat = Instant::now();
                true
            }
            _ => false,
        }
    }

    pub fn collect_expired(&self, alive_timeout: Duration) -> Vec<(PeerId, SessionId)> {
        let now = Instant::now();
        self.sessions
            .iter()
            .filter(|entry| now.duration_since(entry.last_heartbeat) > alive_timeout)
            .map(|entry| (entry.key().clone(), entry.session_id))
            .collect()
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.sessions.contains_key(peer_id)
    }

    pub fn session_id(&self, peer_id: &str) -> Option<SessionId> {
        self.sessions.get(peer_id).map(|session| session.session_id)
    }

    pub fn state(&self, peer_id: &str) -> Option<SessionState> {
        self.sessions.get(peer_id).map(|session| session.state)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[cfg(test)]
    pub fn connections_from(&self, ip: IpAddr) -> usize {
        self.connections_per_ip.get(&ip).map_or(0, |count| *count)
    }

    fn try_reserve_ip_slot(&self, ip: IpAddr) -> Result<usize, usize> {
        let limit = self.limits.max_connections_per_ip;
        match self.connections_per_ip.entry(ip) {
            Entry::Occupied(mut entry) => {
                let count = entry.get_mut();
                if *count >= limit {
                    Err(*count)
                } else {
                    *count += 1;
                    Ok(*count)
                }
            }
            Entry::Vacant(entry) => {
                if limit == 0 {
                    Err(0)
                } else {
                    entry.insert(1);
                    Ok(1)
                }
            }
        }
    }

    fn release_ip_slot(&self, ip: IpAddr) {
        match self.connections_per_ip.entry(ip) {
            Entry::Occupied(mut entry) => {
                if *entry.get() > 1 {
                    *entry.get_mut() -= 1;
                } else {
                    entry.remove();
                }
            }
            Entry::Vacant(_) => {
                debug!(mount = %self.mount, %ip, "Released IP slot that was not reserved");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingObserver {
        disconnected: Mutex<Vec<String>>,
    }

    impl SessionObserver for RecordingObserver {
        fn on_peer_disconnected(&self, peer_id: &str) {
            self.disconnected.lock().unwrap().push(peer_id.to_string());
        }
    }

    fn limits(policy: DuplicatePeerPolicy, max_per_ip: usize) -> SessionLimits {
        SessionLimits {
            max_connections_per_ip: max_per_ip,
            max_peer_id_length: 64,
            duplicate_peer_policy: policy,
        }
    }

    fn make_manager(
        policy: DuplicatePeerPolicy,
        max_per_ip: usize,
    ) -> (SessionManager, Arc<RecordingObserver>) {
        let observer = Arc::new(RecordingObserver::default());
        let manager = SessionManager::new(
            "test",
            limits(policy, max_per_ip),
            Arc::new(ServerMetrics::new()),
            observer.clone(),
        );
        (manager, observer)
    }

    fn request(
        peer_id: &str,
        token: &str,
        port: u16,
    ) -> (ConnectRequest, mpsc::Receiver<Arc<ServerMessage>>) {
        let (tx, rx) = mpsc::channel(4);
        let request = ConnectRequest {
            peer_id: peer_id.to_string(),
            token: token.to_string(),
            sender: tx,
            client_addr: SocketAddr::from(([127, 0, 0, 1], port)),
        };
        (request, rx)
    }

    #[tokio::test]
    async fn open_validates_peer_id() {
        let (manager, _) = make_manager(DuplicatePeerPolicy::Reject, 4);
        let (req, _rx) = request("", "t", 5000);
        assert!(matches!(
            manager.open(req),
            Err(SessionError::InvalidPeerId(_))
        ));
        let (req, _rx) = request("-leading-dash", "t", 5000);
        assert!(manager.open(req).is_err());
        assert_eq!(manager.connections_from("127.0.0.1".parse().unwrap()), 0);
    }

    #[tokio::test]
    async fn reject_policy_refuses_duplicates_but_accepts_matching_token() {
        let (manager, observer) = make_manager(DuplicatePeerPolicy::Reject, 4);

        let (req, _rx_a) = request("A", "token-1", 5000);
        let first = manager.open(req).unwrap();
        assert!(first.evicted.is_none());

        let (req, _rx_b) = request("A", "token-2", 5001);
        assert!(matches!(
            manager.open(req),
            Err(SessionError::DuplicatePeerId(id)) if id == "A"
        ));
        assert_eq!(manager.session_id("A"), Some(first.session_id));

        let (req, _rx_c) = request("A", "token-1", 5002);
        let second = manager.open(req).unwrap();
        let evicted = second.evicted.expect("reconnect replaces the live session");
        assert_eq!(evicted.session_id, first.session_id);
        assert_eq!(evicted.state, SessionState::Disconnected);
        assert_eq!(manager.session_id("A"), Some(second.session_id));
        assert!(observer.disconnected.lock().unwrap().is_empty());
        assert_eq!(manager.connections_from("127.0.0.1".parse().unwrap()), 1);
    }

    #[tokio::test]
    async fn replaced_session_late_close_keeps_successor() {
        let (manager, observer) = make_manager(DuplicatePeerPolicy::Replace, 4);

        let (req, _rx_a) = request("A", "one", 5000);
        let first = manager.open(req).unwrap();
        let (req, _rx_b) = request("A", "two", 5001);
        let second = manager.open(req).unwrap();
        assert!(second.evicted.is_some());

        assert!(manager.close("A", first.session_id).is_none());
        assert_eq!(manager.session_id("A"), Some(second.session_id));
        assert!(observer.disconnected.lock().unwrap().is_empty());

        assert!(manager.close("A", second.session_id).is_some());
        assert!(manager.close("A", second.session_id).is_none());
        assert_eq!(*observer.disconnected.lock().unwrap(), vec!["A".to_string()]);
    }

    #[tokio::test]
    async fn ip_limit_is_enforced_and_released() {
        let (manager, _) = make_manager(DuplicatePeerPolicy::Reject, 1);

        let (req, _rx_a) = request("A", "t", 5000);
        let opened = manager.open(req).unwrap();

        let (req, _rx_b) = request("B", "t", 5001);
        match manager.open(req) {
            Err(SessionError::TooManyConnections { current, limit }) => {
                assert_eq!(current, 1);
                assert_eq!(limit, 1);
            }
            other => panic!("expected ip limit error, got {other:?}"),
        }

        manager.close("A", opened.session_id);
        let (req, _rx_c) = request("B", "t", 5002);
        assert!(manager.open(req).is_ok());
    }

    #[tokio::test]
    async fn reconnect_at_ip_limit_reuses_the_evicted_slot() {
        let metrics = Arc::new(ServerMetrics::new());
        let manager = SessionManager::new(
            "test",
            limits(DuplicatePeerPolicy::Reject, 1),
            metrics.clone(),
            Arc::new(RecordingObserver::default()),
        );
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        let (req, _rx_a) = request("A", "tok", 5000);
        let first = manager.open(req).unwrap();

        let (req, _rx_b) = request("A", "tok", 5001);
        let second = manager
            .open(req)
            .expect("same-token reconnect fits in the slot it replaces");
        assert_eq!(
            second.evicted.map(|session| session.session_id),
            Some(first.session_id)
        );
        assert_eq!(manager.connections_from(ip), 1);

        let connections = metrics.snapshot().connections;
        assert_eq!(connections.active_connections, 1);
        assert_eq!(connections.replaced_sessions, 1);
        assert_eq!(connections.disconnections, 0);
        assert_eq!(connections.rejected_connections, 0);
    }

    #[tokio::test]
    async fn reconnect_from_new_address_moves_the_ip_slot() {
        let (manager, _) = make_manager(DuplicatePeerPolicy::Reject, 1);
        let home: IpAddr = "127.0.0.1".parse().unwrap();
        let away: IpAddr = "10.0.0.2".parse().unwrap();

        let (req, _rx_a) = request("A", "tok", 5000);
        manager.open(req).unwrap();

        let (tx, _rx_b) = mpsc::channel(4);
        manager
            .open(ConnectRequest {
                peer_id: "A".to_string(),
                token: "tok".to_string(),
                sender: tx,
                client_addr: SocketAddr::new(away, 6000),
            })
            .unwrap();
        assert_eq!(manager.connections_from(home), 0);
        assert_eq!(manager.connections_from(away), 1);
    }

    #[test]
    fn ip_slots_stay_bounded_under_concurrent_churn() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let (manager, _) = make_manager(DuplicatePeerPolicy::Reject, 2);
        let ip: IpAddr = "10.0.0.9".parse().unwrap();
        let held = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..2_000 {
                        if manager.try_reserve_ip_slot(ip).is_ok() {
                            let now = held.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            held.fetch_sub(1, Ordering::SeqCst);
                            manager.release_ip_slot(ip);
                        }
                    }
                });
            }
        });

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(manager.connections_from(ip), 0);
    }

    #[tokio::test]
    async fn send_delivers_and_closed_channel_closes_session() {
        let (manager, observer) = make_manager(DuplicatePeerPolicy::Reject, 4);

        let (req, mut rx) = request("A", "t", 5000);
        manager.open(req).unwrap();

        manager
            .send("A", Arc::new(ServerMessage::Open))
            .expect("live session accepts messages");
        assert!(matches!(
            rx.recv().await.as_deref(),
            Some(ServerMessage::Open)
        ));

        drop(rx);
        assert!(matches!(
            manager.send("A", Arc::new(ServerMessage::Open)),
            Err(SessionError::Transport(_))
        ));
        assert!(!manager.contains("A"));
        assert_eq!(*observer.disconnected.lock().unwrap(), vec!["A".to_string()]);

        assert!(matches!(
            manager.send("A", Arc::new(ServerMessage::Open)),
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn full_queue_is_a_transport_failure() {
        let (manager, _) = make_manager(DuplicatePeerPolicy::Reject, 4);
        let (tx, _rx) = mpsc::channel(1);
        manager
            .open(ConnectRequest {
                peer_id: "A".to_string(),
                token: "t".to_string(),
                sender: tx,
                client_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            })
            .unwrap();

        assert!(manager.send("A", Arc::new(ServerMessage::Open)).is_ok());
        assert!(matches!(
            manager.send("A", Arc::new(ServerMessage::Open)),
            Err(SessionError::Transport(_))
        ));
        assert!(!manager.contains("A"));
    }

    #[tokio::test]
    async fn activate_touch_and_expiry() {
        let (manager, _) = make_manager(DuplicatePeerPolicy::Reject, 4);
        let (req, _rx) = request("A", "t", 5000);
        let opened = manager.open(req).unwrap();

        assert_eq!(manager.state("A"), Some(SessionState::Connecting));
        assert!(manager.activate("A", opened.session_id));
        assert_eq!(manager.state("A"), Some(SessionState::Connected));
        assert!(!manager.activate("A", Uuid::new_v4()));

        assert!(manager.touch("A", opened.session_id));
        assert!(manager.collect_expired(Duration::from_secs(60)).is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let expired = manager.collect_expired(Duration::from_millis(5));
        assert_eq!(expired, vec![("A".to_string(), opened.session_id)]);
    }
}
