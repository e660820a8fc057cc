//! Notification listing and read-marking.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use personaworlds_core::storage::notifications;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /notifications` — latest notifications for the caller.
pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let rows = notifications::list_for_user(&state.db, user_id, 50).await?;
    let body: Vec<Value> = rows
        .iter()
        .map(|n| {
            json!({
                "id": n.id,
                "type": n.notif_type,
                "title": n.title,
                "body": n.body,
                "metadata": n.metadata.0,
                "read_at": n.read_at,
                "created_at": n.created_at,
            })
        })
        .collect();
    Ok(Json(json!({ "notifications": body })))
}

/// `POST /notifications/{id}/read` — mark one notification read.
pub async fn read_one(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    if !notifications::mark_read(&state.db, user_id, id).await? {
        return Err(ApiError::not_found("notification not found"));
    }
    Ok(Json(json!({ "read": id })))
}

/// `POST /notifications/read-all` — mark everything read.
pub async fn read_all(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let count = notifications::mark_all_read(&state.db, user_id).await?;
    Ok(Json(json!({ "read": count })))
}
