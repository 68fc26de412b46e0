//! Repository abstraction for metric storage
//!
//! Two backends implement [`MetricRepository`] with identical external
//! behavior:
//! - `InMemoryMetricRepository`: lock-guarded table, optionally checkpointed
//!   to a snapshot file
//! - `SqliteMetricRepository`: one transaction per operation
//!
//! Every mutation is atomic per key: concurrent counter increments are never
//! lost, and a batch is applied entirely or not at all.

use crate::domain::errors::RepositoryError;
use crate::domain::metric::{Metric, MetricValue};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Point-in-time copy of a repository, keyed by metric name
pub type MetricTable = BTreeMap<String, MetricValue>;

#[async_trait]
pub trait MetricRepository: Send + Sync {
    /// Insert the metric, or merge it into the stored one (counters add,
    /// gauges replace). Returns the stored metric after the update.
    async fn upsert(&self, metric: Metric) -> Result<Metric, RepositoryError>;

    /// Apply all metrics as one unit. Any failure rejects the whole batch.
    async fn batch_upsert(&self, metrics: Vec<Metric>) -> Result<(), RepositoryError>;

    async fn get(&self, name: &str) -> Result<Metric, RepositoryError>;

    async fn get_all(&self) -> Result<MetricTable, RepositoryError>;

    /// Liveness check of the underlying store
    async fn ping(&self) -> Result<(), RepositoryError>;

    /// Whether the backend keeps its state only in process memory
    fn is_volatile(&self) -> bool;
}
