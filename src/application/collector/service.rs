//! Collector use cases: decode, verify and apply inbound metrics, and serve
//! reads. All state goes through the shared [`MetricRepository`].

use crate::application::collector::checkpoint::Checkpointer;
use crate::domain::errors::{MetricError, RepositoryError};
use crate::domain::message::{MessageError, MetricMessage, Verification};
use crate::domain::metric::{Metric, MetricKind, RawValue};
use crate::domain::repositories::{MetricRepository, MetricTable};
use crate::infrastructure::snapshot_store::SnapshotError;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error("Hash mismatch for metric {0}")]
    HashMismatch(String),

    #[error("Snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),
}

pub struct MetricService {
    repository: Arc<dyn MetricRepository>,
    checkpointer: Arc<Checkpointer>,
    key: Option<String>,
}

impl MetricService {
    pub fn new(
        repository: Arc<dyn MetricRepository>,
        checkpointer: Arc<Checkpointer>,
        key: Option<String>,
    ) -> Self {
        Self {
            repository,
            checkpointer,
            key: key.filter(|k| !k.is_empty()),
        }
    }

    fn verify(&self, message: &MetricMessage) -> Result<(), CollectorError> {
        let Some(key) = self.key.as_deref() else {
            return Ok(());
        };
        match message.verify(key)? {
            Verification::Invalid => {
                warn!("Rejected message for {}: hash mismatch", message.id);
                Err(CollectorError::HashMismatch(message.id.clone()))
            }
            Verification::Valid | Verification::Skipped => Ok(()),
        }
    }

    fn encode(&self, metric: &Metric) -> Result<MetricMessage, CollectorError> {
        Ok(metric.to_message().signed_with(self.key.as_deref())?)
    }

    /// Path-encoded update: `/update/{kind}/{name}/{value}`
    pub async fn update_from_path(
        &self,
        kind: &str,
        name: &str,
        value: &str,
    ) -> Result<Metric, CollectorError> {
        let metric = Metric::from_raw(name, kind, RawValue::Text(value))?;
        let updated = self.repository.upsert(metric).await?;
        self.checkpointer.after_mutation().await?;
        Ok(updated)
    }

    /// Single message update. Returns the stored metric after the update,
    /// re-encoded (and signed when a key is configured).
    pub async fn update_from_message(
        &self,
        message: &MetricMessage,
    ) -> Result<MetricMessage, CollectorError> {
        // Kind and value problems take precedence over a hash mismatch
        let metric = Metric::try_from(message)?;
        self.verify(message)?;
        let updated = self.repository.upsert(metric).await?;
        self.checkpointer.after_mutation().await?;
        self.encode(&updated)
    }

    /// Validate every message first, then apply them as one batch
    pub async fn update_batch(&self, messages: &[MetricMessage]) -> Result<(), CollectorError> {
        let metrics = messages
            .iter()
            .map(|message| {
                let metric = Metric::try_from(message)?;
                self.verify(message)?;
                Ok(metric)
            })
            .collect::<Result<Vec<_>, CollectorError>>()?;

        if metrics.is_empty() {
            return Ok(());
        }
        self.repository.batch_upsert(metrics).await?;
        self.checkpointer.after_mutation().await?;
        Ok(())
    }

    /// Current value of `name`; a stored metric of another kind is reported
    /// as not found
    pub async fn value(&self, kind: &str, name: &str) -> Result<Metric, CollectorError> {
        let kind = MetricKind::from_str(kind)?;
        let metric = self.repository.get(name).await?;
        if metric.kind() != kind {
            return Err(RepositoryError::NotFound(name.to_string()).into());
        }
        Ok(metric)
    }

    /// Lookup by message id; the response is signed when a key is configured
    pub async fn value_message(
        &self,
        message: &MetricMessage,
    ) -> Result<MetricMessage, CollectorError> {
        let metric = self.repository.get(&message.id).await?;
        self.encode(&metric)
    }

    pub async fn all(&self) -> Result<MetricTable, CollectorError> {
        Ok(self.repository.get_all().await?)
    }

    /// `true` only when a durable backend answers
    pub async fn ping(&self) -> bool {
        match self.repository.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Ping failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metric::MetricValue;
    use crate::infrastructure::repositories::InMemoryMetricRepository;

    fn service(key: Option<&str>) -> MetricService {
        let repository: Arc<dyn MetricRepository> = Arc::new(InMemoryMetricRepository::new());
        let checkpointer = Arc::new(Checkpointer::disabled(repository.clone()));
        MetricService::new(repository, checkpointer, key.map(str::to_string))
    }

    #[tokio::test]
    async fn test_message_update_returns_accumulated_counter() {
        let service = service(None);
        let message = Metric::counter("PollCount", 10).unwrap().to_message();

        service.update_from_message(&message).await.unwrap();
        let response = service.update_from_message(&message).await.unwrap();

        assert_eq!(response.delta, Some(20));
        assert!(response.hash.is_empty());
    }

    #[tokio::test]
    async fn test_hash_is_checked_when_key_configured() {
        let service = service(Some("secret"));
        let unsigned = Metric::gauge("Alloc", 1.0).unwrap().to_message();
        assert!(matches!(
            service.update_from_message(&unsigned).await,
            Err(CollectorError::HashMismatch(_))
        ));

        let signed = unsigned.signed_with(Some("secret")).unwrap();
        let response = service.update_from_message(&signed).await.unwrap();
        assert_eq!(response.verify("secret").unwrap(), Verification::Valid);
    }

    #[tokio::test]
    async fn test_batch_with_bad_hash_applies_nothing() {
        let service = service(Some("secret"));
        let good = Metric::counter("A", 1)
            .unwrap()
            .to_message()
            .signed_with(Some("secret"))
            .unwrap();
        let bad = Metric::counter("B", 1).unwrap().to_message();

        assert!(service.update_batch(&[good, bad]).await.is_err());
        assert!(service.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_value_checks_kind() {
        let service = service(None);
        service.update_from_path("gauge", "Alloc", "1.5").await.unwrap();

        let metric = service.value("gauge", "Alloc").await.unwrap();
        assert_eq!(metric.value, MetricValue::Gauge(1.5));

        assert!(matches!(
            service.value("counter", "Alloc").await,
            Err(CollectorError::Repository(RepositoryError::NotFound(_)))
        ));
        assert!(matches!(
            service.value("timer", "Alloc").await,
            Err(CollectorError::Metric(MetricError::UnsupportedKind(_)))
        ));
    }

    #[tokio::test]
    async fn test_ping_fails_for_in_memory_backend() {
        assert!(!service(None).ping().await);
    }
}
