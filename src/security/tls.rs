#![cfg(feature = "tls")]

use std::fs;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use rustls::ServerConfig as RustlsServerConfig;
use rustls_pemfile::{certs, read_one, Item};
use rustls_pki_types::{CertificateDer, PrivateKeyDer};

use crate::config::TlsServerConfig;

/// Build an [`axum_server`] TLS configuration from the configured PEM files.
pub fn build_rustls_config(tls: &TlsServerConfig) -> Result<RustlsConfig> {
    Ok(RustlsConfig::from_config(Arc::new(build_server_config(tls)?)))
}

fn build_server_config(tls: &TlsServerConfig) -> Result<RustlsServerConfig> {
    let cert_path = configured_path(
        tls.certificate_path.as_deref(),
        "security.transport.tls.certificate_path",
    )?;
    let key_path = configured_path(
        tls.private_key_path.as_deref(),
        "security.transport.tls.private_key_path",
    )?;

    let cert_chain = load_cert_chain(cert_path)?;
    let private_key = load_private_key(key_path)?;

    let mut config = RustlsServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, private_key)
        .map_err(|err| anyhow!("invalid TLS certificate/private key pair: {err}"))?;

    // WebSocket upgrades need HTTP/1.1; h2 stays available for plain HTTP routes.
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(config)
}

fn configured_path<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    value
        .filter(|path| !path.trim().is_empty())
        .ok_or_else(|| anyhow!("{field} must be set"))
}

fn load_cert_chain(cert_path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let data = fs::read(cert_path)
        .with_context(|| format!("failed to read TLS certificate chain at {cert_path}"))?;
    let chain = certs(&mut data.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse TLS certificate chain at {cert_path}"))?;

    if chain.is_empty() {
        anyhow::bail!("no certificates were found in {cert_path}");
    }
    Ok(chain)
}

fn load_private_key(key_path: &str) -> Result<PrivateKeyDer<'static>> {
    let key_bytes = fs::read(key_path)
        .with_context(|| format!("failed to read TLS private key at {key_path}"))?;

    let mut reader = key_bytes.as_slice();
    while let Some(item) = read_one(&mut reader)
        .with_context(|| format!("failed to parse PEM entry inside {key_path}"))?
    {
        match item {
            Item::Pkcs8Key(key) => return Ok(key.into()),
            Item::Pkcs1Key(key) => return Ok(key.into()),
            Item::Sec1Key(key) => return Ok(key.into()),
            _ => continue,
        }
    }

    anyhow::bail!("no supported private key (pkcs8/pkcs1/sec1) was found in {key_path}")
}
