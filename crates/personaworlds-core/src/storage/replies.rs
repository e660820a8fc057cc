//! Replies to posts.
//!
//! The partial unique index `replies_post_persona_key` on
//! `(post_id, persona_id)` is the idempotence anchor for reply jobs:
//! whatever races, at most one AI reply per persona lands on a post.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::{query_err, DbPool};
use crate::error::StorageError;

/// Name of the unique index guarding (post, persona) reply dedup.
pub const REPLY_DEDUP_CONSTRAINT: &str = "replies_post_persona_key";

/// A reply row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Reply {
    pub id: Uuid,
    pub post_id: Uuid,
    pub persona_id: Option<Uuid>,
    pub user_id: Uuid,
    pub authored_by: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Insert an AI-authored reply. Part of the reply-job transaction; a
/// unique violation on [`REPLY_DEDUP_CONSTRAINT`] means another worker
/// already replied for this (post, persona).
pub async fn insert_ai<'e, E: PgExecutor<'e>>(
    executor: E,
    post_id: Uuid,
    persona_id: Uuid,
    user_id: Uuid,
    content: &str,
) -> Result<Reply, StorageError> {
    sqlx::query_as(
        "INSERT INTO replies (post_id, persona_id, user_id, authored_by, content) \
         VALUES ($1, $2, $3, 'ai', $4) \
         RETURNING id, post_id, persona_id, user_id, authored_by, content, created_at",
    )
    .bind(post_id)
    .bind(persona_id)
    .bind(user_id)
    .bind(content)
    .fetch_one(executor)
    .await
    .map_err(query_err)
}

/// True when an AI reply already exists for (post, persona).
pub async fn exists(
    pool: &DbPool,
    post_id: Uuid,
    persona_id: Uuid,
) -> Result<bool, StorageError> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM replies WHERE post_id = $1 AND persona_id = $2)",
    )
    .bind(post_id)
    .bind(persona_id)
    .fetch_one(pool)
    .await
    .map_err(query_err)?;
    Ok(row.0)
}

/// All replies to a post, oldest first.
pub async fn list_for_post(pool: &DbPool, post_id: Uuid) -> Result<Vec<Reply>, StorageError> {
    sqlx::query_as(
        "SELECT id, post_id, persona_id, user_id, authored_by, content, created_at \
         FROM replies WHERE post_id = $1 ORDER BY created_at ASC",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .map_err(query_err)
}

/// The earliest `limit` replies to a post (weekly digest summarization).
pub async fn list_earliest_for_post(
    pool: &DbPool,
    post_id: Uuid,
    limit: i64,
) -> Result<Vec<Reply>, StorageError> {
    sqlx::query_as(
        "SELECT id, post_id, persona_id, user_id, authored_by, content, created_at \
         FROM replies WHERE post_id = $1 ORDER BY created_at ASC LIMIT $2",
    )
    .bind(post_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(query_err)
}

/// Count replies created since `since` (admin analytics).
pub async fn count_since(pool: &DbPool, since: DateTime<Utc>) -> Result<i64, StorageError> {
    let row: (i64,) = sqlx::query_as("SELECT count(*) FROM replies WHERE created_at >= $1")
        .bind(since)
        .fetch_one(pool)
        .await
        .map_err(query_err)?;
    Ok(row.0)
}
