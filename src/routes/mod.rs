//! HTTP gateway (EMBP): each sibling module exports a subrouter, merged here
//! under `/api`. `main.rs` only ever sees [`router`].

use axum::{http::StatusCode, http::Uri, Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::AppState;

mod auth;
mod energy;
mod extract;
mod health;
mod items;
mod plants;
mod sensor_data;
mod sensors;

// ---

pub fn router(state: AppState) -> Router {
    // ---
    let api = Router::new()
        .merge(auth::router())
        .merge(plants::router())
        .merge(sensors::router())
        .merge(items::router())
        .merge(sensor_data::router())
        .merge(energy::router());

    Router::new()
        .merge(health::router())
        .nest("/api", api)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(uri: Uri) -> (StatusCode, Json<Value>) {
    tracing::debug!("No route for {}", uri);
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
