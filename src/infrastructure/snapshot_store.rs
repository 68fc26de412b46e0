//! Flat-file snapshots of repository state
//!
//! A snapshot is a JSON document:
//!
//! ```json
//! {"saved_at": "2024-05-01T10:00:00Z",
//!  "metrics": {"PollCount": {"type": "counter", "value": 10}}}
//! ```
//!
//! Writes go to a sibling temp file that is renamed over the target, so an
//! interrupted write never clobbers the previous valid snapshot. Writers on
//! one store (and its clones) are serialized from reading the repository
//! through the rename.

use crate::domain::errors::RepositoryError;
use crate::domain::repositories::{MetricRepository, MetricTable};
use crate::infrastructure::repositories::InMemoryMetricRepository;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Snapshot file is empty: {0:?}")]
    Empty(PathBuf),

    #[error("Malformed snapshot {path:?}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Snapshot I/O failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read repository state: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    metrics: MetricTable,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SnapshotError {
        SnapshotError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Serialize the full state of `repository` to the snapshot file
    pub async fn write(&self, repository: &dyn MetricRepository) -> Result<(), SnapshotError> {
        // Held until the rename so the file always reflects the latest read
        let _guard = self.write_lock.lock().await;
        let metrics = repository.get_all().await?;
        let count = metrics.len();
        let document = SnapshotDocument {
            saved_at: Some(Utc::now()),
            metrics,
        };
        let content = serde_json::to_vec(&document).map_err(|source| SnapshotError::Malformed {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, content)
            .await
            .map_err(|e| self.io_error(e))?;
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!("Saved {} metrics to {:?}", count, self.path);
        Ok(())
    }

    /// Load the snapshot file into a fresh in-memory repository
    pub async fn read(&self) -> Result<InMemoryMetricRepository, SnapshotError> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SnapshotError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(self.io_error(e)),
        };

        if content.iter().all(u8::is_ascii_whitespace) {
            return Err(SnapshotError::Empty(self.path.clone()));
        }

        let document: SnapshotDocument =
            serde_json::from_slice(&content).map_err(|source| SnapshotError::Malformed {
                path: self.path.clone(),
                source,
            })?;

        info!(
            "Loaded {} metrics from {:?} (saved at {:?})",
            document.metrics.len(),
            self.path,
            document.saved_at
        );
        Ok(InMemoryMetricRepository::with_metrics(document.metrics))
    }
}
