use crate::application::collector::MetricService;
use crate::interfaces::http::handlers;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MetricService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::list_metrics))
        .route("/ping", get(handlers::ping))
        .route("/value/{kind}/{name}", get(handlers::get_value))
        .route("/value/", post(handlers::value_from_json))
        .route("/update/{kind}/{name}/{value}", post(handlers::update_from_path))
        .route("/update/", post(handlers::update_from_json))
        .route("/updates/", post(handlers::update_batch))
        .layer(CatchPanicLayer::new())
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
