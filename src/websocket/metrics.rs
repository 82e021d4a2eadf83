use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;

use super::routes::AppState;
use crate::metrics::MetricsSnapshot;

fn enforce_metrics_auth(headers: &HeaderMap, expected: Option<&str>) -> Result<(), StatusCode> {
    let Some(raw_header) = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    else {
        tracing::warn!("Unauthorized metrics access attempt: missing Authorization header");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let Some(token) = raw_header.strip_prefix("Bearer ") else {
        tracing::warn!("Unauthorized metrics access attempt: invalid Authorization scheme");
        return Err(StatusCode::UNAUTHORIZED);
    };

    if expected.is_some_and(|expected| token == expected) {
        tracing::debug!("Metrics access authorized via bearer token");
        return Ok(());
    }

    tracing::warn!("Unauthorized metrics access attempt: token rejected");
    Err(StatusCode::UNAUTHORIZED)
}

/// Live counts for one mount.
#[derive(Debug, Serialize)]
pub struct MountMetrics {
    pub name: String,
    pub sessions: usize,
    pub broadcasters: usize,
    pub receivers: usize,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub snapshot: MetricsSnapshot,
    pub mounts: Vec<MountMetrics>,
}

/// JSON counters for the whole process.
pub async fn metrics_handler(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<MetricsResponse>, StatusCode> {
    if state.require_metrics_auth {
        enforce_metrics_auth(&headers, state.metrics_auth_token.as_deref())?;
    }

    let mounts = state
        .servers
        .iter()
        .map(|server| MountMetrics {
            name: server.mount().name.clone(),
            sessions: server.session_count(),
            broadcasters: server.list(crate::protocol::Role::Broadcaster).len(),
            receivers: server.list(crate::protocol::Role::Receiver).len(),
        })
        .collect();

    Ok(Json(MetricsResponse {
        snapshot: state.metrics.snapshot(),
        mounts,
    }))
}
