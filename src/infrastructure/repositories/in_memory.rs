//! In-Memory Metric Repository
//!
//! Thread-safe implementation of [`MetricRepository`] backed by a
//! `tokio::sync::RwLock`-guarded table. Every operation holds the lock for its
//! whole duration, so a batch is observed either entirely or not at all and
//! counter increments are never lost.
//!
//! State is lost on restart unless a `SnapshotStore` checkpoints it.

use crate::domain::errors::RepositoryError;
use crate::domain::metric::Metric;
use crate::domain::repositories::{MetricRepository, MetricTable};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct InMemoryMetricRepository {
    metrics: Arc<RwLock<MetricTable>>,
}

impl InMemoryMetricRepository {
    pub fn new() -> Self {
        Self::with_metrics(MetricTable::new())
    }

    pub fn with_metrics(metrics: MetricTable) -> Self {
        Self {
            metrics: Arc::new(RwLock::new(metrics)),
        }
    }

    /// Merge `metric` into whatever is currently stored under its name
    fn merge(current: Option<Metric>, metric: Metric) -> Result<Metric, RepositoryError> {
        match current {
            Some(mut stored) => {
                stored.update(metric.value)?;
                Ok(stored)
            }
            None => Ok(metric),
        }
    }
}

impl Default for InMemoryMetricRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricRepository for InMemoryMetricRepository {
    async fn upsert(&self, metric: Metric) -> Result<Metric, RepositoryError> {
        let mut metrics = self.metrics.write().await;
        let current = metrics
            .get(&metric.name)
            .map(|value| Metric {
                name: metric.name.clone(),
                value: *value,
            });
        let updated = Self::merge(current, metric)?;
        metrics.insert(updated.name.clone(), updated.value);
        Ok(updated)
    }

    async fn batch_upsert(&self, metrics: Vec<Metric>) -> Result<(), RepositoryError> {
        let mut table = self.metrics.write().await;

        // Stage every update first; the table is only touched once the whole
        // batch has validated.
        let mut staged: HashMap<String, Metric> = HashMap::with_capacity(metrics.len());
        for metric in metrics {
            let current = staged.remove(&metric.name).or_else(|| {
                table.get(&metric.name).map(|value| Metric {
                    name: metric.name.clone(),
                    value: *value,
                })
            });
            let updated = Self::merge(current, metric)?;
            staged.insert(updated.name.clone(), updated);
        }

        table.extend(staged.into_iter().map(|(name, metric)| (name, metric.value)));
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Metric, RepositoryError> {
        let metrics = self.metrics.read().await;
        metrics
            .get(name)
            .map(|value| Metric {
                name: name.to_string(),
                value: *value,
            })
            .ok_or_else(|| RepositoryError::NotFound(name.to_string()))
    }

    async fn get_all(&self) -> Result<MetricTable, RepositoryError> {
        Ok(self.metrics.read().await.clone())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Err(RepositoryError::PingUnsupported("in-memory"))
    }

    fn is_volatile(&self) -> bool {
        true
    }
}
