//! Post lifecycle endpoints: approval, reply-job enqueueing, threads.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use personaworlds_core::workflow;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for approval; content, when present and non-empty,
/// replaces the draft's content.
#[derive(Deserialize, Default)]
pub struct ApproveRequest {
    #[serde(default)]
    pub content: Option<String>,
}

/// `POST /posts/{id}/approve` — transition a draft to published.
pub async fn approve(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<Uuid>,
    body: Option<Json<ApproveRequest>>,
) -> Result<Json<Value>, ApiError> {
    let new_content = body.and_then(|Json(b)| b.content);
    let post = workflow::approve::approve(
        &state.db,
        &state.config.limits,
        user_id,
        post_id,
        new_content,
    )
    .await?;

    Ok(Json(json!({
        "id": post.id,
        "status": post.status,
        "authored_by": post.authored_by,
        "content": post.content,
        "published_at": post.published_at,
    })))
}

/// Request body for reply generation.
#[derive(Deserialize, Default)]
pub struct GenerateRepliesRequest {
    #[serde(default)]
    pub persona_ids: Vec<Uuid>,
}

/// `POST /posts/{id}/generate-replies` — enqueue one reply job per
/// resolved persona.
pub async fn generate_replies(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<Uuid>,
    body: Option<Json<GenerateRepliesRequest>>,
) -> Result<Json<Value>, ApiError> {
    let persona_ids = body.map(|Json(b)| b.persona_ids).unwrap_or_default();
    let summary =
        workflow::replies::generate_replies(&state.db, user_id, post_id, persona_ids).await?;
    Ok(Json(json!({
        "enqueued": summary.enqueued,
        "skipped": summary.skipped,
    })))
}

/// `GET /posts/{id}/thread` — the post, its ordered replies, and an LLM
/// summary.
pub async fn thread(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<workflow::thread::ThreadView>, ApiError> {
    let view = workflow::thread::get_thread(
        &state.db,
        &state.llm,
        &state.config.limits,
        user_id,
        post_id,
    )
    .await?;
    Ok(Json(view))
}
