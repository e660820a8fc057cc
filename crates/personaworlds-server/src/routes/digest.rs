//! Weekly digest endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use personaworlds_core::storage::weekly;
use personaworlds_core::timeutil::week_start;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /digest/weekly` — the caller's digest for the current ISO week.
/// Empty items mean the builder has not picked the user up yet.
pub async fn weekly(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let week = week_start(chrono::Utc::now());
    match weekly::get(&state.db, user_id, week).await? {
        Some(digest) => Ok(Json(json!({
            "week_start": digest.week_start,
            "items": digest.items.0,
            "updated_at": digest.updated_at,
        }))),
        None => Ok(Json(json!({
            "week_start": week,
            "items": [],
            "updated_at": null,
        }))),
    }
}
