use crate::server::SignalingServer;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Query, State};
use axum::response::Response;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;

use super::connection::handle_socket;

/// Query string of the PeerJS signaling socket: `?key=&id=&token=`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ConnectParams {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// WebSocket handler for the signaling socket.
///
/// The upgrade is always accepted so that parameter problems can be reported
/// with an `ERROR` frame, which is what PeerJS clients expect.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(server): State<Arc<SignalingServer>>,
    Query(params): Query<ConnectParams>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, server, addr, params))
}
