#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use peer_relay_server::config;
use peer_relay_server::logging;
use peer_relay_server::websocket;
use std::net::SocketAddr;

/// Peer relay server -- WebRTC signaling with broadcaster/receiver presence
#[derive(Parser, Debug)]
#[command(name = "peer-relay-server")]
#[command(about = "An in-memory WebRTC signaling and relay server")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    // config::load() only reports validation problems; startup must fail on them.
    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  TLS enabled: {}", cfg.security.transport.tls.enabled);
                println!(
                    "  Metrics auth required: {}",
                    cfg.security.require_metrics_auth
                );
                println!("  Alive timeout: {}s", cfg.websocket.alive_timeout_secs);
                for mount in &cfg.mounts {
                    let routes = mount.routes();
                    println!(
                        "  Mount `{}`: presence at {}, signaling at {} ({:?} duplicates)",
                        mount.name, routes.index, routes.socket, mount.duplicate_peer_policy
                    );
                }
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    let _log_guard = logging::init_with_config(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let app = websocket::build_application(&cfg);

    for server in &app.servers {
        let routes = server.mount().routes();
        tracing::info!(
            mount = %server.mount().name,
            socket = %routes.socket,
            presence = %routes.index,
            allow_discovery = server.mount().allow_discovery,
            "Mount ready"
        );
        let maintenance_server = server.clone();
        tokio::spawn(async move {
            maintenance_server.maintenance_task().await;
        });
    }

    let make_service = app
        .router
        .into_make_service_with_connect_info::<SocketAddr>();

    #[cfg(feature = "tls")]
    if cfg.security.transport.tls.enabled {
        let tls_config =
            peer_relay_server::security::build_rustls_config(&cfg.security.transport.tls)
                .map_err(|err| anyhow::anyhow!("failed to initialize TLS configuration: {err}"))?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown_handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
        });

        tracing::info!(%addr, "Server started over HTTPS");
        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(make_service)
            .await?;

        return Ok(());
    }

    // Plain TCP, typically behind a reverse proxy that terminates TLS.
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        cors_origins = %cfg.security.cors_origins,
        "Server started over HTTP"
    );

    axum::serve(listener, make_service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
