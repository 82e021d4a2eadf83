//! Presence and discovery endpoints served per mount.

use crate::protocol::{generate_peer_id, PeerId, Role};
use crate::server::SignalingServer;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Body of the register and unregister routes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerRequest {
    #[serde(default)]
    pub peer_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub message: String,
    pub broadcasters: Vec<PeerId>,
    pub receivers: Vec<PeerId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBroadcasterResponse {
    pub success: bool,
    pub peer_id: PeerId,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReceiverResponse {
    pub success: bool,
    pub peer_id: PeerId,
    pub broadcasters: Vec<PeerId>,
}

fn bad_request(error: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": error.into() })),
    )
        .into_response()
}

/// Pull a non-empty `peerId` out of a request body.
fn require_peer_id(body: Result<Json<PeerRequest>, JsonRejection>) -> Result<PeerId, Response> {
    let Json(request) = body.map_err(|rejection| bad_request(rejection.body_text()))?;
    match request.peer_id {
        Some(peer_id) if !peer_id.trim().is_empty() => Ok(peer_id),
        _ => Err(bad_request("peerId is required")),
    }
}

pub async fn index(State(server): State<Arc<SignalingServer>>) -> Json<IndexResponse> {
    Json(IndexResponse {
        message: server.mount().index_message.clone(),
        broadcasters: server.list(Role::Broadcaster),
        receivers: server.list(Role::Receiver),
    })
}

pub async fn register_broadcaster(
    State(server): State<Arc<SignalingServer>>,
    body: Result<Json<PeerRequest>, JsonRejection>,
) -> Response {
    let peer_id = match require_peer_id(body) {
        Ok(peer_id) => peer_id,
        Err(response) => return response,
    };

    server.register(Role::Broadcaster, &peer_id);
    tracing::info!(mount = %server.mount().name, %peer_id, "Broadcaster registered");
    Json(RegisterBroadcasterResponse {
        success: true,
        peer_id,
        message: "Broadcaster registered".to_string(),
    })
    .into_response()
}

pub async fn register_receiver(
    State(server): State<Arc<SignalingServer>>,
    body: Result<Json<PeerRequest>, JsonRejection>,
) -> Response {
    let peer_id = match require_peer_id(body) {
        Ok(peer_id) => peer_id,
        Err(response) => return response,
    };

    let outcome = server.register(Role::Receiver, &peer_id);
    tracing::info!(mount = %server.mount().name, %peer_id, "Receiver registered");
    Json(RegisterReceiverResponse {
        success: true,
        peer_id,
        broadcasters: outcome.broadcasters.unwrap_or_default(),
    })
    .into_response()
}

pub async fn list_broadcasters(State(server): State<Arc<SignalingServer>>) -> Response {
    Json(json!({ "broadcasters": server.list(Role::Broadcaster) })).into_response()
}

pub async fn unregister(
    State(server): State<Arc<SignalingServer>>,
    body: Result<Json<PeerRequest>, JsonRejection>,
) -> Response {
    let peer_id = match require_peer_id(body) {
        Ok(peer_id) => peer_id,
        Err(response) => return response,
    };

    let removed = server.unregister(&peer_id);
    tracing::info!(mount = %server.mount().name, %peer_id, removed, "Peer unregistered");
    Json(json!({ "success": true })).into_response()
}

/// Server-assigned id for clients that do not choose their own.
pub async fn generate_id() -> String {
    generate_peer_id()
}

/// Live peer ids on this mount, when discovery is enabled.
pub async fn list_peers(State(server): State<Arc<SignalingServer>>) -> Response {
    if !server.mount().allow_discovery {
        return StatusCode::FORBIDDEN.into_response();
    }
    Json(server.peer_ids()).into_response()
}
