//! Mapping of collector errors onto HTTP responses.
//!
//! Bodies are plain text. Unknown kinds are "not implemented", anything the
//! caller got wrong is a bad request and storage failures are logged and
//! reported as internal errors.

use crate::application::collector::CollectorError;
use crate::domain::errors::{MetricError, RepositoryError};
use crate::domain::message::MessageError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug)]
pub enum ApiError {
    Collector(CollectorError),
    /// Request body could not be decoded
    BadRequest(String),
}

impl From<CollectorError> for ApiError {
    fn from(e: CollectorError) -> Self {
        ApiError::Collector(e)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Collector(e) => write!(f, "{}", e),
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

fn metric_status(e: &MetricError) -> StatusCode {
    match e {
        MetricError::UnsupportedKind(_) => StatusCode::NOT_IMPLEMENTED,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Collector(e) => match e {
                CollectorError::Metric(e) => metric_status(e),
                CollectorError::Message(MessageError::Metric(e)) => metric_status(e),
                CollectorError::Message(MessageError::EmptyKey | MessageError::InvalidKey(_)) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                CollectorError::HashMismatch(_) => StatusCode::BAD_REQUEST,
                CollectorError::Repository(RepositoryError::NotFound(_)) => StatusCode::NOT_FOUND,
                CollectorError::Repository(RepositoryError::Metric(e)) => metric_status(e),
                CollectorError::Repository(_) | CollectorError::Snapshot(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Collector(CollectorError::Repository(RepositoryError::NotFound(_))) => {
                "unknown metric".to_string()
            }
            _ if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED => {
                tracing::error!("Request failed: {}", self);
                "internal server error".to_string()
            }
            _ => {
                tracing::debug!("Request rejected ({}): {}", status, self);
                self.to_string()
            }
        };
        (status, body).into_response()
    }
}
