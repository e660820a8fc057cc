//! Room listing, room posts, draft creation, and battle creation.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use personaworlds_core::storage::{posts, rooms};
use personaworlds_core::workflow;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /rooms` — all rooms.
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let rooms = rooms::list(&state.db).await?;
    let body: Vec<Value> = rooms
        .iter()
        .map(|room| {
            json!({
                "id": room.id,
                "slug": room.slug,
                "name": room.name,
                "description": room.description,
            })
        })
        .collect();
    Ok(Json(json!({ "rooms": body })))
}

fn post_json(post: &posts::Post) -> Value {
    json!({
        "id": post.id,
        "room_id": post.room_id,
        "persona_id": post.persona_id,
        "authored_by": post.authored_by,
        "status": post.status,
        "content": post.content,
        "template_id": post.template_id,
        "created_at": post.created_at,
        "published_at": post.published_at,
    })
}

/// `GET /rooms/{id}/posts` — published posts plus the caller's drafts.
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    if rooms::get(&state.db, room_id).await?.is_none() {
        return Err(ApiError::not_found("room not found"));
    }
    let posts = posts::list_for_room(&state.db, room_id, user_id, 100).await?;
    let body: Vec<Value> = posts.iter().map(post_json).collect();
    Ok(Json(json!({ "posts": body })))
}

/// Request body for draft creation.
#[derive(Deserialize)]
pub struct DraftRequest {
    pub persona_id: Uuid,
}

/// `POST /rooms/{id}/posts/draft` — generate and persist a DRAFT post.
pub async fn create_draft(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(room_id): Path<Uuid>,
    Json(body): Json<DraftRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let post = workflow::draft::create_draft(
        &state.db,
        &state.llm,
        &state.config.limits,
        user_id,
        room_id,
        body.persona_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(post_json(&post))))
}

/// Request body for battle creation.
#[derive(Deserialize)]
pub struct BattleRequest {
    pub template_id: Uuid,
    pub opening: String,
}

/// `POST /rooms/{id}/battles` — create a published battle from a
/// template. Creation is additionally limited per user.
pub async fn create_battle(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(room_id): Path<Uuid>,
    Json(body): Json<BattleRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if !state.creation_limiter.allow(&user_id.to_string()) {
        return Err(ApiError::rate_limited("creation rate limit reached"));
    }

    let post = workflow::battles::create_battle(
        &state.db,
        &state.config.limits,
        user_id,
        room_id,
        body.template_id,
        &body.opening,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(post_json(&post))))
}
