//! shardstore node - HTTP document store endpoint
//!
//! Serves the document API that `HttpBackend` shards talk to, plus
//! health/ready endpoints and Prometheus metrics.

use anyhow::Result;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};

use shardstore::server::{self, NodeState};
use shardstore::{StoreConfig, StoreMetrics};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first to get log level
    let config = StoreConfig::load()?;

    shardstore::init_tracing(&config.log_level)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        node = %config.node_name,
        port = config.http_port,
        "Starting shardstore node"
    );

    let metrics = StoreMetrics::install()?;
    info!("Prometheus metrics initialized");

    let state = NodeState::new(config.node_name.clone(), metrics);
    let app = server::router(state);
    let addr: SocketAddr = ([0, 0, 0, 0], config.http_port).into();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "HTTP server error");
        return Err(e.into());
    }

    info!("shardstore node shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
