use thiserror::Error;

use crate::domain::metric::MetricKind;

/// Errors raised while building or updating a single metric
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetricError {
    #[error("Unsupported metric kind: '{0}'")]
    UnsupportedKind(String),

    #[error("Type mismatch for {name}: stored {stored}, got {incoming}")]
    TypeMismatch {
        name: String,
        stored: MetricKind,
        incoming: MetricKind,
    },

    #[error("Invalid {kind} value '{raw}': {reason}")]
    InvalidValue {
        kind: MetricKind,
        raw: String,
        reason: String,
    },

    #[error("Field '{field}' is required for {kind} metric {name}")]
    MissingValue {
        name: String,
        kind: MetricKind,
        field: &'static str,
    },

    #[error("Metric name cannot be empty")]
    EmptyName,

    #[error("Counter {name} overflowed: {current} + {delta}")]
    CounterOverflow {
        name: String,
        current: i64,
        delta: i64,
    },
}

/// Errors surfaced by [`MetricRepository`](crate::domain::repositories::MetricRepository) backends
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Metric not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupted row for {name}: {reason}")]
    CorruptedRow { name: String, reason: String },

    #[error("Ping is not supported by the {0} backend")]
    PingUnsupported(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_formatting() {
        let err = MetricError::TypeMismatch {
            name: "PollCount".to_string(),
            stored: MetricKind::Counter,
            incoming: MetricKind::Gauge,
        };

        let msg = err.to_string();
        assert!(msg.contains("PollCount"));
        assert!(msg.contains("stored counter"));
        assert!(msg.contains("got gauge"));
    }

    #[test]
    fn test_repository_error_wraps_metric_error() {
        let err: RepositoryError = MetricError::UnsupportedKind("histogram".to_string()).into();
        assert_eq!(err.to_string(), "Unsupported metric kind: 'histogram'");
    }
}
