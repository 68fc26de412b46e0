//! Metrics collector server
//!
//! Accepts metric updates over HTTP and keeps them in memory (with optional
//! JSON snapshots) or in SQLite.
//!
//! # Usage
//! ```sh
//! STORE_INTERVAL=0 KEY=secret cargo run --bin server -- -a localhost:8080
//! ```

use anyhow::{Context, Result};
use metricsync::application::collector::CollectorApplication;
use metricsync::config::ServerConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("Metrics server {} starting...", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load()?;
    info!(
        "Configuration loaded: address={}, store_interval={:?}, store_file={:?}, restore={}, database={}, signing={}",
        config.address,
        config.store_interval,
        config.store_file,
        config.restore,
        config.database_dsn().is_some(),
        config.key().is_some()
    );

    let listener = TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("Failed to bind {}", config.address))?;
    let app = CollectorApplication::build(config).await?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received."),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        signal.cancel();
    });

    app.run(listener, shutdown).await
}
