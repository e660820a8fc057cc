//! Template listing and creation.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use personaworlds_core::storage::templates;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /templates` — public templates plus the caller's own.
pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let rows = templates::list_visible(&state.db, user_id).await?;
    let body: Vec<Value> = rows
        .iter()
        .map(|t| {
            json!({
                "id": t.id,
                "name": t.name,
                "prompt_rules": t.prompt_rules,
                "turn_count": t.turn_count,
                "word_limit": t.word_limit,
                "is_public": t.is_public,
                "is_own": t.user_id == Some(user_id),
                "created_at": t.created_at,
            })
        })
        .collect();
    Ok(Json(json!({ "templates": body })))
}

/// Request body for template creation.
#[derive(Deserialize)]
pub struct TemplateRequest {
    pub name: String,
    #[serde(default)]
    pub prompt_rules: String,
    pub turn_count: i32,
    pub word_limit: i32,
    #[serde(default)]
    pub is_public: bool,
}

/// `POST /templates` — create a template.
pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<TemplateRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if !state.creation_limiter.allow(&user_id.to_string()) {
        return Err(ApiError::rate_limited("creation rate limit reached"));
    }

    let name = body.name.trim();
    if name.is_empty() || name.chars().count() > 80 {
        return Err(ApiError::validation("name must be 1-80 characters"));
    }
    if !(2..=20).contains(&body.turn_count) {
        return Err(ApiError::validation("turn_count must be between 2 and 20"));
    }
    if !(40..=500).contains(&body.word_limit) {
        return Err(ApiError::validation("word_limit must be between 40 and 500"));
    }

    let template = templates::create(
        &state.db,
        user_id,
        name,
        body.prompt_rules.trim(),
        body.turn_count,
        body.word_limit,
        body.is_public,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": template.id,
            "name": template.name,
            "turn_count": template.turn_count,
            "word_limit": template.word_limit,
            "is_public": template.is_public,
        })),
    ))
}
