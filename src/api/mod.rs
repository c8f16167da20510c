//! HTTP transport: summarize endpoints, health, and metrics

pub mod handlers;

pub use handlers::AppState;

use crate::config::ServerConfig;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Build the service router
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/v1/summarize", post(handlers::summarize))
        .route("/v1/summarize/stream", post(handlers::summarize_stream))
        .route("/v1/status", get(handlers::status))
        .route("/healthz", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(RequestBodyLimitLayer::new(server.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
