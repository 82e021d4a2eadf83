/// Transport security
///
/// HTTPS/WSS termination for the listener, gated behind the `tls` feature.
pub mod tls;

#[cfg(feature = "tls")]
pub use tls::build_rustls_config;
