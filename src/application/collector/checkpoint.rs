use crate::config::CheckpointPolicy;
use crate::domain::repositories::MetricRepository;
use crate::infrastructure::snapshot_store::{SnapshotError, SnapshotStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Writes the repository to its snapshot file according to the configured
/// policy. Snapshots only apply to volatile (in-memory) repositories.
pub struct Checkpointer {
    repository: Arc<dyn MetricRepository>,
    store: Option<SnapshotStore>,
    policy: CheckpointPolicy,
}

impl Checkpointer {
    pub fn new(
        repository: Arc<dyn MetricRepository>,
        store: Option<SnapshotStore>,
        policy: CheckpointPolicy,
    ) -> Self {
        let policy = if store.is_some() && repository.is_volatile() {
            policy
        } else {
            CheckpointPolicy::Disabled
        };
        Self {
            repository,
            store,
            policy,
        }
    }

    pub fn disabled(repository: Arc<dyn MetricRepository>) -> Self {
        Self::new(repository, None, CheckpointPolicy::Disabled)
    }

    pub fn policy(&self) -> CheckpointPolicy {
        self.policy
    }

    /// Called after every successful mutation. Writes immediately under the
    /// synchronous policy; the error is meant to fail the triggering request.
    pub async fn after_mutation(&self) -> Result<(), SnapshotError> {
        match (&self.policy, &self.store) {
            (CheckpointPolicy::Synchronous, Some(store)) => {
                store.write(self.repository.as_ref()).await
            }
            _ => Ok(()),
        }
    }

    /// Write a snapshot now, regardless of policy (used on shutdown)
    pub async fn flush(&self) -> Result<(), SnapshotError> {
        match (&self.policy, &self.store) {
            (CheckpointPolicy::Disabled, _) | (_, None) => Ok(()),
            (_, Some(store)) => {
                store.write(self.repository.as_ref()).await?;
                info!("Final snapshot written to {:?}", store.path());
                Ok(())
            }
        }
    }

    /// Start the periodic timer. Each tick writes a snapshot; failures are
    /// logged and the next tick retries.
    pub fn spawn_periodic(self: &Arc<Self>, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        let CheckpointPolicy::Periodic(period) = self.policy else {
            return None;
        };
        let this = self.clone();
        info!("Periodic snapshots every {:?}", period);

        Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = ticker.tick() => {
                        if let Some(store) = &this.store
                            && let Err(e) = store.write(this.repository.as_ref()).await
                        {
                            error!("Periodic snapshot failed: {}", e);
                        }
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metric::Metric;
    use crate::infrastructure::repositories::InMemoryMetricRepository;
    use std::time::Duration;

    fn in_memory() -> Arc<dyn MetricRepository> {
        Arc::new(InMemoryMetricRepository::new())
    }

    #[tokio::test]
    async fn test_synchronous_policy_writes_after_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("sync.json"));
        let repo = in_memory();
        let checkpointer = Checkpointer::new(
            repo.clone(),
            Some(store.clone()),
            CheckpointPolicy::Synchronous,
        );

        repo.upsert(Metric::counter("PollCount", 1).unwrap()).await.unwrap();
        checkpointer.after_mutation().await.unwrap();

        let restored = store.read().await.unwrap();
        assert_eq!(restored.get_all().await.unwrap(), repo.get_all().await.unwrap());
    }

    #[tokio::test]
    async fn test_periodic_policy_does_not_write_on_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("periodic.json"));
        let checkpointer = Checkpointer::new(
            in_memory(),
            Some(store.clone()),
            CheckpointPolicy::Periodic(Duration::from_secs(3600)),
        );

        checkpointer.after_mutation().await.unwrap();
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_periodic_timer_writes_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("timer.json"));
        let repo = in_memory();
        repo.upsert(Metric::gauge("Alloc", 3.5).unwrap()).await.unwrap();

        let checkpointer = Arc::new(Checkpointer::new(
            repo,
            Some(store.clone()),
            CheckpointPolicy::Periodic(Duration::from_millis(20)),
        ));
        let shutdown = CancellationToken::new();
        let handle = checkpointer.spawn_periodic(shutdown.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let restored = store.read().await.unwrap();
        assert_eq!(restored.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_periodic_timer_survives_write_failures() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the target path makes every rename fail
        let target = dir.path().join("blocked");
        std::fs::create_dir_all(target.join("inner")).unwrap();

        let checkpointer = Arc::new(Checkpointer::new(
            in_memory(),
            Some(SnapshotStore::new(&target)),
            CheckpointPolicy::Periodic(Duration::from_millis(10)),
        ));
        let shutdown = CancellationToken::new();
        let handle = checkpointer.spawn_periodic(shutdown.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!handle.is_finished());
        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_policy_disabled_without_store_or_for_durable_backends() {
        let checkpointer = Checkpointer::new(in_memory(), None, CheckpointPolicy::Synchronous);
        assert_eq!(checkpointer.policy(), CheckpointPolicy::Disabled);
        assert!(Arc::new(checkpointer)
            .spawn_periodic(CancellationToken::new())
            .is_none());
    }
}
