use crate::config::MountConfig;
use crate::protocol::{ErrorCode, PeerId, ServerMessage};
use crate::server::{ConnectRequest, SessionError, SignalingServer};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::handler::ConnectParams;
use super::sending::{reject_and_close, send_server_message};

/// Checked connect parameters.
struct SocketIdentity {
    peer_id: PeerId,
    token: String,
}

fn check_params(params: ConnectParams, mount: &MountConfig) -> Result<SocketIdentity, ErrorCode> {
    if params.key.as_deref() != Some(mount.key.as_str()) {
        return Err(ErrorCode::InvalidKey);
    }
    let peer_id = params
        .id
        .filter(|id| !id.is_empty())
        .ok_or(ErrorCode::InvalidPeerId)?;
    let token = params
        .token
        .filter(|token| !token.is_empty())
        .ok_or(ErrorCode::MissingToken)?;
    Ok(SocketIdentity { peer_id, token })
}

pub(super) async fn handle_socket(
    socket: WebSocket,
    server: Arc<SignalingServer>,
    addr: SocketAddr,
    params: ConnectParams,
) {
    let (mut sender, mut receiver) = socket.split();
    let mount_name = server.mount().name.clone();

    let identity = match check_params(params, server.mount()) {
        Ok(identity) => identity,
        Err(error_code) => {
            tracing::info!(mount = %mount_name, client_addr = %addr, code = ?error_code, "Rejected signaling socket parameters");
            server.metrics().increment_rejected_connections();
            reject_and_close(&mut sender, &ServerMessage::error(error_code)).await;
            return;
        }
    };

    let (tx, mut rx) = mpsc::channel::<Arc<ServerMessage>>(server.config().outbound_queue_capacity);
    let peer_id = identity.peer_id;

    let session_id = match server.connect(ConnectRequest {
        peer_id: peer_id.clone(),
        token: identity.token,
        sender: tx,
        client_addr: addr,
    }) {
        Ok(session_id) => {
            tracing::info!(mount = %mount_name, %peer_id, %session_id, client_addr = %addr, "Signaling socket established");
            session_id
        }
        Err(SessionError::DuplicatePeerId(_)) => {
            let message = ServerMessage::IdTaken {
                message: "ID is taken".to_string(),
            };
            reject_and_close(&mut sender, &message).await;
            return;
        }
        Err(err) => {
            let message = ServerMessage::Error {
                message: err.to_string(),
                error_code: err.error_code(),
            };
            reject_and_close(&mut sender, &message).await;
            return;
        }
    };

    // The session manager owns the only sender; the writer ends once the
    // session is closed or replaced and the queue has drained.
    let writer_peer = peer_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(err) = send_server_message(&mut sender, &message).await {
                tracing::debug!(peer_id = %writer_peer, error = %err, "Signaling socket write failed");
                break;
            }
        }
        let _ = sender.close().await;
    });

    let reader_server = server.clone();
    let reader_peer = peer_id.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::debug!(peer_id = %reader_peer, error = %err, "Signaling socket read failed");
                    break;
                }
            };

            match frame {
                Message::Text(text) => {
                    reader_server.handle_text_frame(&reader_peer, session_id, text.as_str());
                }
                Message::Binary(_) => {
                    reader_server.send_error(
                        &reader_peer,
                        ErrorCode::InvalidMessage,
                        "Binary frames are not supported; send JSON text frames.",
                    );
                }
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => receive_task.abort(),
        _ = &mut receive_task => send_task.abort(),
    }

    if server.disconnect(&peer_id, session_id) {
        tracing::info!(mount = %mount_name, %peer_id, %session_id, "Signaling socket closed");
    }
}
