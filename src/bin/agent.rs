//! Metrics agent
//!
//! Polls host and process statistics and reports them to the collector.
//!
//! # Usage
//! ```sh
//! RATE_LIMIT=3 cargo run --bin agent -- -a localhost:8080 -p 2s -r 10s
//! ```

use anyhow::Result;
use metricsync::application::agent::AgentRunner;
use metricsync::config::AgentConfig;
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

    info!("Metrics agent {} starting...", env!("CARGO_PKG_VERSION"));

    let config = AgentConfig::load()?;
    let runner = AgentRunner::new(config);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received."),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        signal.cancel();
    });

    runner.run(shutdown).await
}
