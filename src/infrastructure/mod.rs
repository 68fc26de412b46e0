pub mod core;
pub mod persistence;
pub mod repositories;
pub mod snapshot_store;
pub mod system_stats;

pub use persistence::{Database, SqliteMetricRepository};
pub use repositories::InMemoryMetricRepository;
pub use snapshot_store::{SnapshotError, SnapshotStore};
