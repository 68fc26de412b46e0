//! Request handlers for the collector endpoints.
//!
//! JSON bodies are read as raw bytes and decoded here so that a malformed or
//! untyped body is always a plain `400`, independent of the `Content-Type`
//! header the client sent.

use crate::domain::message::MetricMessage;
use crate::interfaces::http::error::ApiError;
use crate::interfaces::http::listing;
use crate::interfaces::http::router::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse};
use serde::de::DeserializeOwned;

fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// `GET /`
pub async fn list_metrics(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let metrics = state.service.all().await?;
    Ok(Html(listing::render(&metrics)))
}

/// `GET /value/{kind}/{name}`
pub async fn get_value(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let metric = state.service.value(&kind, &name).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        metric.value.display_string(),
    ))
}

/// `POST /update/{kind}/{name}/{value}`
pub async fn update_from_path(
    State(state): State<AppState>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    state.service.update_from_path(&kind, &name, &value).await?;
    Ok(StatusCode::OK)
}

/// `POST /update/`
pub async fn update_from_json(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MetricMessage>, ApiError> {
    let message: MetricMessage = decode(&body)?;
    let updated = state.service.update_from_message(&message).await?;
    Ok(Json(updated))
}

/// `POST /updates/`
pub async fn update_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let messages: Vec<MetricMessage> = decode(&body)?;
    state.service.update_batch(&messages).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], "[]"))
}

/// `POST /value/`
pub async fn value_from_json(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MetricMessage>, ApiError> {
    let request: MetricMessage = decode(&body)?;
    let message = state.service.value_message(&request).await?;
    Ok(Json(message))
}

/// `GET /ping`
pub async fn ping(State(state): State<AppState>) -> StatusCode {
    if state.service.ping().await {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
