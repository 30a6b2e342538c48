//! relay-proxy
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                  RELAY PROXY                      │
//!                     │                                                   │
//!   Client Request    │  ┌────────────┐    ┌─────────┐                    │
//!   ──────────────────┼─▶│ http       │───▶│ routing │                    │
//!                     │  │ server     │    └────┬────┘                    │
//!                     │  └────────────┘         │                         │
//!                     │           ┌─────────────┼──────────────┐          │
//!                     │           ▼             ▼              ▼          │
//!                     │    ┌────────────┐ ┌───────────┐ ┌────────────┐    │
//!                     │    │ReverseProxy│ │  pooled   │ │WsReverse-  │    │
//!                     │    │ + weighted │ │  engines  │ │Proxy+relay │    │
//!                     │    └─────┬──────┘ └─────┬─────┘ └─────┬──────┘    │
//!                     │          └──────────────┼─────────────┘           │
//!                     │                         ▼                         │
//!                     │                  upstream servers ────────────────┼──▶ Backend
//!                     └──────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::net::TcpListener;

use relay_proxy::config::load_config;
use relay_proxy::net::tls::load_tls_config;
use relay_proxy::observability::{logging, metrics};
use relay_proxy::HttpServer;

/// Reverse proxy for HTTP and WebSocket upstreams.
#[derive(Debug, Parser)]
#[command(name = "relay-proxy", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "relay-proxy.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // axum-server enables a second rustls provider; pick one for the process.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = load_config(&cli.config)?;

    logging::init(Some(&config.observability.log_filter))?;
    tracing::info!("relay-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        config = %cli.config.display(),
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        tls = config.listener.tls.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config)?;

    match tls {
        Some(tls) => {
            let addr: SocketAddr = bind_address.parse()?;
            let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
            server.run_tls(addr, rustls, axum_server::Handle::new()).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            server.run(listener, std::future::pending()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
