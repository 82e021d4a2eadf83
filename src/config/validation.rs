//! Configuration validation functions.

use super::mount::MountConfig;
use super::Config;
use std::collections::HashSet;
use std::path::Path;

/// Routes served once per process, outside any mount.
pub const PROCESS_ROUTES: &[&str] = &["/health", "/metrics"];

/// Route segments owned by the presence API.
const RESERVED_KEYS: &[&str] = &["register", "broadcasters", "unregister"];

/// Validate configuration before the server starts.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    validate_metrics_auth(config)?;
    validate_tls(config)?;
    config.websocket.validate()?;
    validate_mounts(&config.mounts)?;

    if config.security.max_message_size < 1024 {
        anyhow::bail!(
            "security.max_message_size must be at least 1024 bytes (configured: {})",
            config.security.max_message_size
        );
    }

    Ok(())
}

fn validate_metrics_auth(config: &Config) -> anyhow::Result<()> {
    if config.security.require_metrics_auth {
        let token_present = config
            .security
            .metrics_auth_token
            .as_deref()
            .is_some_and(|t| !t.is_empty());

        if !token_present {
            anyhow::bail!(
                "security.require_metrics_auth is enabled but no metrics_auth_token is configured.\n\
                 Configure one with:\n\
                 export PEER_RELAY__SECURITY__METRICS_AUTH_TOKEN=\"$(openssl rand -hex 32)\""
            );
        }
    } else if is_production_mode() {
        eprintln!(
            "SECURITY WARNING: /metrics is publicly accessible in production. \
             Set PEER_RELAY__SECURITY__REQUIRE_METRICS_AUTH=true and a metrics_auth_token."
        );
    }
    Ok(())
}

fn validate_tls(config: &Config) -> anyhow::Result<()> {
    let tls = &config.security.transport.tls;
    if !tls.enabled {
        return Ok(());
    }

    let cert_path = required_path(
        tls.certificate_path.as_deref(),
        "security.transport.tls.certificate_path",
    )?;
    if !Path::new(cert_path).exists() {
        anyhow::bail!("TLS certificate file not found at {cert_path}");
    }

    let key_path = required_path(
        tls.private_key_path.as_deref(),
        "security.transport.tls.private_key_path",
    )?;
    if !Path::new(key_path).exists() {
        anyhow::bail!("TLS private key file not found at {key_path}");
    }

    Ok(())
}

fn required_path<'a>(value: Option<&'a str>, field: &str) -> anyhow::Result<&'a str> {
    value
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| anyhow::anyhow!("{field} must be provided when TLS is enabled"))
}

fn validate_mounts(mounts: &[MountConfig]) -> anyhow::Result<()> {
    if mounts.is_empty() {
        anyhow::bail!("at least one entry in `mounts` is required");
    }

    let mut names = HashSet::new();
    let mut http_prefixes = HashSet::new();
    let mut signaling_prefixes = HashSet::new();
    let mut route_paths: HashSet<String> = PROCESS_ROUTES.iter().map(|p| p.to_string()).collect();

    for mount in mounts {
        if mount.name.trim().is_empty() {
            anyhow::bail!("mount names must not be empty");
        }
        if !names.insert(mount.name.as_str()) {
            anyhow::bail!("duplicate mount name `{}`", mount.name);
        }

        validate_prefix(&mount.http_prefix, &mount.name, "http_prefix", true)?;
        validate_prefix(&mount.signaling_prefix, &mount.name, "signaling_prefix", false)?;

        if !http_prefixes.insert(mount.http_prefix.as_str()) {
            anyhow::bail!(
                "mount `{}` reuses http_prefix `{}`",
                mount.name,
                mount.http_prefix
            );
        }
        if !signaling_prefixes.insert(mount.signaling_prefix.as_str()) {
            anyhow::bail!(
                "mount `{}` reuses signaling_prefix `{}`",
                mount.name,
                mount.signaling_prefix
            );
        }

        if mount.key.is_empty()
            || !mount
                .key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            anyhow::bail!(
                "mount `{}` key must be non-empty ASCII alphanumeric (configured: `{}`)",
                mount.name,
                mount.key
            );
        }
        if RESERVED_KEYS.contains(&mount.key.as_str()) {
            anyhow::bail!("mount `{}` key `{}` is reserved", mount.name, mount.key);
        }

        if mount.max_peer_id_length == 0 {
            anyhow::bail!("mount `{}` max_peer_id_length must be positive", mount.name);
        }

        for path in mount.routes().all() {
            if !route_paths.insert(path.to_string()) {
                anyhow::bail!("mount `{}` route `{path}` collides with another route", mount.name);
            }
        }
    }

    Ok(())
}

fn validate_prefix(
    prefix: &str,
    mount_name: &str,
    field: &str,
    allow_empty: bool,
) -> anyhow::Result<()> {
    if prefix.is_empty() {
        if allow_empty {
            return Ok(());
        }
        anyhow::bail!("mount `{mount_name}` {field} must not be empty");
    }
    if !prefix.starts_with('/') || prefix.ends_with('/') {
        anyhow::bail!(
            "mount `{mount_name}` {field} must start with '/' and not end with '/' (configured: `{prefix}`)"
        );
    }
    if prefix.contains(['{', '}', '*', ' ']) {
        anyhow::bail!("mount `{mount_name}` {field} contains route metacharacters: `{prefix}`");
    }
    Ok(())
}

/// Detect if we're running in production mode.
///
/// Checks `PEER_RELAY__ENVIRONMENT` first, then the generic `PRODUCTION` / `PROD` variables.
pub fn is_production_mode() -> bool {
    use std::env;

    if let Ok(mode) = env::var("PEER_RELAY__ENVIRONMENT") {
        let mode = mode.to_lowercase();
        return mode == "production" || mode == "prod";
    }

    env::var("PRODUCTION").is_ok() || env::var("PROD").is_ok()
}
