use crate::domain::errors::{MetricError, RepositoryError};
use crate::domain::metric::{Metric, MetricKind, MetricValue};
use crate::domain::repositories::{MetricRepository, MetricTable};
use crate::infrastructure::persistence::database::Database;
use async_trait::async_trait;
use sqlx::SqliteConnection;
use std::str::FromStr;
use tracing::debug;

type MetricRow = (String, String, Option<i64>, Option<f64>);

// Counters increment in place. The update is skipped (no RETURNING row) when
// the stored kind differs or the sum would leave the integer range.
const UPSERT_COUNTER: &str = r#"
    INSERT INTO metrics (name, kind, delta, value)
    VALUES ($1, 'counter', $2, NULL)
    ON CONFLICT(name) DO UPDATE SET
        delta = metrics.delta + excluded.delta
    WHERE metrics.kind = excluded.kind
      AND typeof(metrics.delta + excluded.delta) = 'integer'
    RETURNING delta
"#;

const UPSERT_GAUGE: &str = r#"
    INSERT INTO metrics (name, kind, delta, value)
    VALUES ($1, 'gauge', NULL, $2)
    ON CONFLICT(name) DO UPDATE SET
        value = excluded.value
    WHERE metrics.kind = excluded.kind
    RETURNING value
"#;

pub struct SqliteMetricRepository {
    database: Database,
}

impl SqliteMetricRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Apply one metric inside the caller's transaction
    async fn apply(conn: &mut SqliteConnection, metric: &Metric) -> Result<Metric, RepositoryError> {
        let updated = match metric.value {
            MetricValue::Counter(delta) => sqlx::query_scalar::<_, i64>(UPSERT_COUNTER)
                .bind(&metric.name)
                .bind(delta)
                .fetch_optional(&mut *conn)
                .await?
                .map(MetricValue::Counter),
            MetricValue::Gauge(value) => sqlx::query_scalar::<_, f64>(UPSERT_GAUGE)
                .bind(&metric.name)
                .bind(value)
                .fetch_optional(&mut *conn)
                .await?
                .map(MetricValue::Gauge),
        };

        match updated {
            Some(value) => Ok(Metric {
                name: metric.name.clone(),
                value,
            }),
            None => Err(Self::rejection(conn, metric).await),
        }
    }

    /// Explain why an upsert statement left the stored row untouched
    async fn rejection(conn: &mut SqliteConnection, metric: &Metric) -> RepositoryError {
        let stored = match Self::fetch(conn, &metric.name).await {
            Ok(stored) => stored,
            Err(e) => return e,
        };

        match (stored.value, metric.value) {
            (MetricValue::Counter(current), MetricValue::Counter(delta)) => {
                MetricError::CounterOverflow {
                    name: metric.name.clone(),
                    current,
                    delta,
                }
                .into()
            }
            (stored_value, incoming) if stored_value.kind() != incoming.kind() => {
                MetricError::TypeMismatch {
                    name: metric.name.clone(),
                    stored: stored_value.kind(),
                    incoming: incoming.kind(),
                }
                .into()
            }
            _ => RepositoryError::CorruptedRow {
                name: metric.name.clone(),
                reason: "upsert was rejected without a kind conflict".to_string(),
            },
        }
    }

    async fn fetch(conn: &mut SqliteConnection, name: &str) -> Result<Metric, RepositoryError> {
        let row = sqlx::query_as::<_, MetricRow>(
            "SELECT name, kind, delta, value FROM metrics WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Self::map_row(row),
            None => Err(RepositoryError::NotFound(name.to_string())),
        }
    }

    fn map_row((name, kind, delta, value): MetricRow) -> Result<Metric, RepositoryError> {
        let corrupted = |reason: String| RepositoryError::CorruptedRow {
            name: name.clone(),
            reason,
        };
        let kind = MetricKind::from_str(&kind).map_err(|e| corrupted(e.to_string()))?;
        let value = match (kind, delta, value) {
            (MetricKind::Counter, Some(delta), _) => MetricValue::Counter(delta),
            (MetricKind::Gauge, _, Some(value)) => MetricValue::Gauge(value),
            (kind, _, _) => return Err(corrupted(format!("missing {} value", kind))),
        };
        Ok(Metric { name, value })
    }
}

#[async_trait]
impl MetricRepository for SqliteMetricRepository {
    async fn upsert(&self, metric: Metric) -> Result<Metric, RepositoryError> {
        let mut tx = self.database.pool.begin().await?;
        let updated = Self::apply(&mut tx, &metric).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn batch_upsert(&self, metrics: Vec<Metric>) -> Result<(), RepositoryError> {
        let mut tx = self.database.pool.begin().await?;
        for metric in &metrics {
            // Dropping `tx` on error rolls back everything applied so far
            Self::apply(&mut tx, metric).await?;
        }
        tx.commit().await?;
        debug!("Persisted batch of {} metrics", metrics.len());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Metric, RepositoryError> {
        let mut conn = self.database.pool.acquire().await?;
        Self::fetch(&mut conn, name).await
    }

    async fn get_all(&self) -> Result<MetricTable, RepositoryError> {
        let rows = sqlx::query_as::<_, MetricRow>(
            "SELECT name, kind, delta, value FROM metrics ORDER BY name",
        )
        .fetch_all(&self.database.pool)
        .await?;

        rows.into_iter()
            .map(|row| Self::map_row(row).map(|metric| (metric.name, metric.value)))
            .collect()
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.database.pool)
            .await?;
        Ok(())
    }

    fn is_volatile(&self) -> bool {
        false
    }
}
