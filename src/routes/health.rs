//! Liveness probe for container orchestrators and CI.
//!
//! Lives outside `/api` and takes no credentials. It does not touch the
//! database, so a 200 only means the process is accepting requests.

use axum::{routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    tracing::trace!("GET /health");
    Json(HealthResponse { status: "ok" })
}

/// Subrouter with `GET /health`, generic over the gateway's state type.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
