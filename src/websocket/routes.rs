use crate::config::Config;
use crate::metrics::ServerMetrics;
use crate::server::{ServerConfig, SignalingServer};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handler::websocket_handler;
use super::http_api;
use super::metrics::metrics_handler;

/// State for the process-level routes.
#[derive(Clone)]
pub struct AppState {
    pub servers: Vec<Arc<SignalingServer>>,
    pub metrics: Arc<ServerMetrics>,
    pub require_metrics_auth: bool,
    pub metrics_auth_token: Option<String>,
}

impl AppState {
    pub fn new(
        servers: Vec<Arc<SignalingServer>>,
        metrics: Arc<ServerMetrics>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            servers,
            metrics,
            require_metrics_auth: config.require_metrics_auth,
            metrics_auth_token: config.metrics_auth_token.clone(),
        }
    }
}

/// Routes for one mount: presence API, id/discovery endpoints and the
/// signaling socket.
pub fn create_router(server: Arc<SignalingServer>) -> Router {
    let routes = server.mount().routes();

    Router::new()
        .route(&routes.index, get(http_api::index))
        .route(
            &routes.register_broadcaster,
            post(http_api::register_broadcaster),
        )
        .route(&routes.register_receiver, post(http_api::register_receiver))
        .route(&routes.broadcasters, get(http_api::list_broadcasters))
        .route(&routes.unregister, post(http_api::unregister))
        .route(&routes.generate_id, get(http_api::generate_id))
        .route(&routes.peers, get(http_api::list_peers))
        .route(&routes.socket, get(websocket_handler))
        .with_state(server)
}

/// Build the CORS layer from a comma-separated origin list, or "*".
pub fn cors_layer(cors_origins: &str) -> CorsLayer {
    if cors_origins.trim() == "*" {
        return CorsLayer::permissive();
    }

    let origins: Vec<_> = cors_origins
        .split(',')
        .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("No valid CORS origins configured, using permissive CORS");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Full application: every mount plus `/health` and `/metrics`.
pub fn create_app(state: AppState, cors_origins: &str) -> Router {
    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(state.clone());

    for server in state.servers {
        app = app.merge(create_router(server));
    }

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(cors_origins)),
    )
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Every configured mount, wired into one router.
pub struct Application {
    pub router: Router,
    pub servers: Vec<Arc<SignalingServer>>,
    pub metrics: Arc<ServerMetrics>,
}

pub fn build_application(config: &Config) -> Application {
    let metrics = Arc::new(ServerMetrics::new());
    let server_config = ServerConfig::from(config);

    let servers: Vec<Arc<SignalingServer>> = config
        .mounts
        .iter()
        .cloned()
        .map(|mount| SignalingServer::new(mount, server_config.clone(), metrics.clone()))
        .collect();

    let state = AppState::new(servers.clone(), metrics.clone(), &server_config);
    let router = create_app(state, &config.security.cors_origins);

    Application {
        router,
        servers,
        metrics,
    }
}
