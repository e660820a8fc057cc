//! Liveness, readiness, and metrics endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use personaworlds_core::storage;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /healthz` — process is up.
pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /readyz` — database reachable and migrations applied.
pub async fn readyz(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    storage::ping(&state.db).await?;

    let migrations = storage::migrations_applied(&state.db).await?;
    if migrations == 0 {
        return Err(ApiError::conflict("migrations not applied"));
    }

    Ok(Json(json!({ "status": "ready", "migrations": migrations })))
}

/// `GET /metrics` — Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render()
}
