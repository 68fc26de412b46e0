use crate::application::collector::checkpoint::Checkpointer;
use crate::application::collector::service::MetricService;
use crate::config::ServerConfig;
use crate::domain::repositories::MetricRepository;
use crate::infrastructure::{
    Database, InMemoryMetricRepository, SnapshotStore, SqliteMetricRepository,
};
use crate::interfaces::http::{AppState, router};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Fully wired collector: repository, snapshot policy and service
pub struct CollectorApplication {
    pub config: ServerConfig,
    pub service: Arc<MetricService>,
    pub checkpointer: Arc<Checkpointer>,
}

impl CollectorApplication {
    pub async fn build(config: ServerConfig) -> Result<Self> {
        let repository: Arc<dyn MetricRepository> = match config.database_dsn() {
            Some(dsn) => {
                info!("Initializing Database at {}", dsn);
                let database = Database::new(dsn)
                    .await
                    .context("Failed to initialize database")?;
                Arc::new(SqliteMetricRepository::new(database))
            }
            None => Arc::new(Self::in_memory(&config).await),
        };

        let store = config.snapshot_path().map(SnapshotStore::new);
        let checkpointer = Arc::new(Checkpointer::new(
            repository.clone(),
            store,
            config.checkpoint_policy(),
        ));
        info!("Snapshot policy: {:?}", checkpointer.policy());

        let service = Arc::new(MetricService::new(
            repository,
            checkpointer.clone(),
            config.key().map(str::to_string),
        ));

        Ok(Self {
            config,
            service,
            checkpointer,
        })
    }

    /// In-memory repository, restored from the snapshot file when enabled.
    /// A missing or unreadable snapshot starts the collector empty.
    async fn in_memory(config: &ServerConfig) -> InMemoryMetricRepository {
        let Some(path) = config.snapshot_path().filter(|_| config.restore) else {
            return InMemoryMetricRepository::new();
        };
        match SnapshotStore::new(&path).read().await {
            Ok(repository) => {
                info!("Restored metrics from {:?}", path);
                repository
            }
            Err(e) => {
                warn!("Starting with empty metrics, restore failed: {}", e);
                InMemoryMetricRepository::new()
            }
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            service: self.service.clone(),
        }
    }

    /// Serve until `shutdown` fires, then write the final snapshot
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let periodic = self.checkpointer.spawn_periodic(shutdown.clone());
        let app = router(self.state());

        info!("Collector listening on {}", listener.local_addr()?);
        let signal = shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
            .context("HTTP server failed")?;

        info!("Collector shutting down...");
        shutdown.cancel();
        if let Some(handle) = periodic
            && let Err(e) = handle.await
        {
            warn!("Snapshot timer ended abnormally: {}", e);
        }
        if let Err(e) = self.checkpointer.flush().await {
            error!("Final snapshot failed: {}", e);
        }
        info!("Collector stopped.");
        Ok(())
    }
}
