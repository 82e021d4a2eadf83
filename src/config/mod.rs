//! Configuration module for the peer relay server.
//!
//! Configuration is assembled from compiled-in defaults, JSON documents and
//! `PEER_RELAY__SECTION__FIELD` environment overrides.
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`mount`]: Per-mount signaling settings (prefixes, key, duplicate-id policy)
//! - [`security`]: CORS, metrics auth, limits and TLS
//! - [`logging`]: Logging configuration
//! - [`websocket`]: Signaling socket liveness and queue settings
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod mount;
pub mod security;
pub mod types;
pub mod validation;
pub mod websocket;

pub use loader::{from_layers, load, ENV_OVERRIDE_PREFIX};

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use mount::{DuplicatePeerPolicy, MountConfig, MountRoutes};

pub use security::{SecurityConfig, TlsServerConfig, TransportSecurityConfig};

pub use types::Config;

pub use validation::{is_production_mode, validate_config};

pub use websocket::WebSocketConfig;
