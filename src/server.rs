//! HTTP exposition: serves the live snapshot in Prometheus text format.
//!
//! Stateless between requests; every scrape renders whatever snapshot is
//! live at request time. Collection-side failures never surface here: the
//! endpoint always answers with the last successfully installed snapshot.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tracing::error;

use crate::collector::AppContext;

/// Prometheus text exposition content type.
const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// Builds the exposition router: the metrics path plus a health route.
pub fn router(ctx: Arc<AppContext>, metrics_path: &str) -> Router {
    Router::new()
        .route(metrics_path, get(handle_metrics))
        .route("/healthz", get(handle_health))
        .with_state(ctx)
}

async fn handle_health() -> &'static str {
    "ok"
}

async fn handle_metrics(State(ctx): State<Arc<AppContext>>) -> Response {
    // Take the live bundle out of the registry first; encoding happens
    // without any lock held, concurrent with cycle installs.
    let snapshot = ctx.registry.current();
    match snapshot.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
