//! HTTP endpoints for sync-relay.
//!
//! `POST /rpc` carries one MessagePack-encoded request and answers with one
//! encoded response. Health and metrics are served alongside.

pub mod health;
mod metrics;

use crate::server::CardSetRelay;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::http::{header::CONTENT_TYPE, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Router};
use std::sync::Arc;

pub use health::HealthStatus;

/// Content type of encoded requests and responses.
pub const MSGPACK: &str = "application/msgpack";

/// Build the HTTP router with all endpoints.
pub fn build_router(relay: Arc<CardSetRelay>) -> Router {
    let body_limit = relay.config().limits.max_request_bytes;
    Router::new()
        .route("/rpc", post(rpc_handler))
        .route("/health", get(health::health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(relay))
}

/// Request/response endpoint.
///
/// Failures of a decoded request are answered in-band with an error
/// response; only undecodable bodies get a 400.
async fn rpc_handler(Extension(relay): Extension<Arc<CardSetRelay>>, body: Bytes) -> Response {
    match relay.handle_bytes(&body).await {
        Ok(bytes) => ([(CONTENT_TYPE, MSGPACK)], bytes).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}
