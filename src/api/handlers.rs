//! Request handlers for the summarize API

use crate::error::SummarizeError;
use crate::events::{EventSink, ProgressEvent};
use crate::metrics::METRICS;
use crate::orchestrator::SummarizeEngine;
use crate::prompts::SummaryMode;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SummarizeEngine>,
}

/// Summarization request body
#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub text: String,
    #[serde(default)]
    pub mode: SummaryMode,
}

/// `POST /v1/summarize`: blocking JSON response
pub async fn summarize(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> Response {
    match state
        .engine
        .summarize(&request.text, request.mode, &EventSink::disabled())
        .await
    {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => error_response(&err),
    }
}

/// `POST /v1/summarize/stream`: SSE progress events ending in a result or
/// error
pub async fn summarize_stream(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    let (sink, rx) = EventSink::channel();

    tokio::spawn(async move {
        if let Err(err) = state
            .engine
            .summarize(&request.text, request.mode, &sink)
            .await
        {
            sink.emit(ProgressEvent::Error {
                message: err.to_string(),
                retry_after: err.retry_after_secs(),
            });
            sink.emit(ProgressEvent::Complete);
        }
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| {
            let sse = Event::default().event(event.name()).json_data(&event);
            (sse, rx)
        })
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// `GET /v1/status`: worker pool snapshot
pub async fn status(State(state): State<AppState>) -> Response {
    Json(state.engine.pool_status()).into_response()
}

/// `GET /healthz`
pub async fn health() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

/// `GET /metrics`: Prometheus text format
pub async fn metrics() -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        METRICS.export_prometheus(),
    )
        .into_response()
}

/// Map pipeline errors onto transport status codes, distinguishing rate
/// limits (with Retry-After) and overload from generic failure.
fn error_response(err: &SummarizeError) -> Response {
    let (status, retry_after) = match err {
        SummarizeError::RateLimited { retry_after } => {
            (StatusCode::TOO_MANY_REQUESTS, *retry_after)
        }
        SummarizeError::Overloaded(_) => (StatusCode::SERVICE_UNAVAILABLE, None),
        SummarizeError::Timeout => (StatusCode::GATEWAY_TIMEOUT, None),
        SummarizeError::AllChunksFailed
        | SummarizeError::Upstream { .. }
        | SummarizeError::InvalidResponse(_)
        | SummarizeError::Request(_) => (StatusCode::BAD_GATEWAY, None),
        SummarizeError::Configuration(_) | SummarizeError::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, None)
        }
    };

    let body = Json(json!({
        "error": err.to_string(),
        "retry_after": retry_after,
    }));

    let mut response = (status, body).into_response();
    if let Some(secs) = retry_after {
        if let Ok(value) = header::HeaderValue::from_str(&secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}
