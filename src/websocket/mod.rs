// WebSocket module: the signaling socket plus the HTTP surface around it
//
// - handler: WebSocket upgrade handler (entry point)
// - connection: per-socket reader/writer tasks
// - sending: message serialization and sending functions
// - http_api: presence registry and discovery endpoints
// - routes: per-mount router and the assembled application
// - metrics: metrics endpoint and authentication

mod connection;
mod handler;
mod http_api;
mod metrics;
mod routes;
mod sending;

pub use handler::{websocket_handler, ConnectParams};
pub use http_api::{PeerRequest, RegisterBroadcasterResponse, RegisterReceiverResponse};
pub use metrics::{metrics_handler, MetricsResponse, MountMetrics};
pub use routes::{build_application, cors_layer, create_app, create_router, AppState, Application};
