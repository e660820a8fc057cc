//! Posts: drafts, published battles, and the DRAFT → PUBLISHED transition.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::{query_err, DbPool};
use crate::error::StorageError;

/// A post row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub room_id: Uuid,
    pub persona_id: Option<Uuid>,
    pub user_id: Uuid,
    pub authored_by: String,
    pub status: String,
    pub content: String,
    pub template_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Post {
    /// True when the post is in the published state.
    pub fn is_published(&self) -> bool {
        self.status == "published"
    }
}

const SELECT_COLS: &str = "id, room_id, persona_id, user_id, authored_by, status, content, \
    template_id, created_at, updated_at, published_at";

/// Insert an AI-authored draft. Executor-generic so the draft insert and
/// its quota event share one transaction.
pub async fn insert_draft<'e, E: PgExecutor<'e>>(
    executor: E,
    room_id: Uuid,
    persona_id: Uuid,
    user_id: Uuid,
    content: &str,
) -> Result<Post, StorageError> {
    let sql = format!(
        "INSERT INTO posts (room_id, persona_id, user_id, authored_by, status, content) \
         VALUES ($1, $2, $3, 'ai', 'draft', $4) RETURNING {SELECT_COLS}"
    );
    sqlx::query_as(&sql)
        .bind(room_id)
        .bind(persona_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(executor)
        .await
        .map_err(query_err)
}

/// Insert a human-authored battle, published immediately.
pub async fn insert_battle(
    pool: &DbPool,
    room_id: Uuid,
    user_id: Uuid,
    content: &str,
    template_id: Uuid,
) -> Result<Post, StorageError> {
    let sql = format!(
        "INSERT INTO posts (room_id, user_id, authored_by, status, content, template_id, published_at) \
         VALUES ($1, $2, 'human', 'published', $3, $4, now()) RETURNING {SELECT_COLS}"
    );
    sqlx::query_as(&sql)
        .bind(room_id)
        .bind(user_id)
        .bind(content)
        .bind(template_id)
        .fetch_one(pool)
        .await
        .map_err(query_err)
}

/// Fetch a post by id.
pub async fn get(pool: &DbPool, id: Uuid) -> Result<Option<Post>, StorageError> {
    let sql = format!("SELECT {SELECT_COLS} FROM posts WHERE id = $1");
    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(query_err)
}

/// Transition a draft to published. Part of the approval transaction;
/// only touches the row while it is still a draft, so concurrent
/// approvals serialize on the row and the loser sees zero rows updated.
pub async fn publish_draft<'e, E: PgExecutor<'e>>(
    executor: E,
    post_id: Uuid,
    content: &str,
) -> Result<Option<Post>, StorageError> {
    let sql = format!(
        "UPDATE posts SET status = 'published', authored_by = 'ai_draft_approved', \
         content = $2, published_at = now(), updated_at = now() \
         WHERE id = $1 AND status = 'draft' RETURNING {SELECT_COLS}"
    );
    sqlx::query_as(&sql)
        .bind(post_id)
        .bind(content)
        .fetch_optional(executor)
        .await
        .map_err(query_err)
}

/// Posts visible in a room to `viewer`: everything published plus the
/// viewer's own drafts, newest first.
pub async fn list_for_room(
    pool: &DbPool,
    room_id: Uuid,
    viewer: Uuid,
    limit: i64,
) -> Result<Vec<Post>, StorageError> {
    let sql = format!(
        "SELECT {SELECT_COLS} FROM posts \
         WHERE room_id = $1 AND (status = 'published' OR user_id = $2) \
         ORDER BY created_at DESC LIMIT $3"
    );
    sqlx::query_as(&sql)
        .bind(room_id)
        .bind(viewer)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(query_err)
}

/// Published posts by a persona, newest first (public profile view).
pub async fn list_published_for_persona(
    pool: &DbPool,
    persona_id: Uuid,
    limit: i64,
) -> Result<Vec<Post>, StorageError> {
    let sql = format!(
        "SELECT {SELECT_COLS} FROM posts \
         WHERE persona_id = $1 AND status = 'published' \
         ORDER BY published_at DESC LIMIT $2"
    );
    sqlx::query_as(&sql)
        .bind(persona_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(query_err)
}

/// Count posts published since `since` (admin analytics).
pub async fn count_published_since(
    pool: &DbPool,
    since: DateTime<Utc>,
) -> Result<i64, StorageError> {
    let row: (i64,) = sqlx::query_as(
        "SELECT count(*) FROM posts WHERE status = 'published' AND published_at >= $1",
    )
    .bind(since)
    .fetch_one(pool)
    .await
    .map_err(query_err)?;
    Ok(row.0)
}
