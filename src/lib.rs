#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

//! # Peer Relay Server
//!
//! An in-memory WebRTC signaling server. Peers announce themselves as
//! broadcasters or receivers over HTTP, then exchange offers, answers and ICE
//! candidates through a PeerJS-compatible WebSocket relay.
//!
//! Several independent mounts can be served from one process; each has its
//! own presence registry and session table.

/// Server configuration and environment variables
pub mod config;

/// Structured logging configuration
pub mod logging;

/// Process-wide counters
pub mod metrics;

/// Signaling frame definitions and validation
pub mod protocol;

/// TLS termination
pub mod security;

/// Session lifecycle, presence registry and relay dispatch
pub mod server;

/// WebSocket and HTTP surface
pub mod websocket;
