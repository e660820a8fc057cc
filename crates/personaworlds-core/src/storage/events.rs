//! The append-only analytics event log.
//!
//! Used by derived queries (feed engagement, weekly digest "seen"
//! exclusion, admin funnels), never stream-processed. Callers sanitize
//! metadata before it reaches this module.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use uuid::Uuid;

use super::{query_err, DbPool};
use crate::error::StorageError;

/// Append one event.
pub async fn append(
    pool: &DbPool,
    user_id: Option<Uuid>,
    event_name: &str,
    metadata: &Value,
) -> Result<(), StorageError> {
    sqlx::query("INSERT INTO events (user_id, event_name, metadata) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(event_name)
        .bind(Json(metadata))
        .execute(pool)
        .await
        .map_err(query_err)?;
    Ok(())
}

/// Event counts grouped by name since `since` (admin analytics).
pub async fn counts_by_name_since(
    pool: &DbPool,
    since: DateTime<Utc>,
) -> Result<Vec<(String, i64)>, StorageError> {
    sqlx::query_as(
        "SELECT event_name, count(*) FROM events WHERE created_at >= $1 \
         GROUP BY event_name ORDER BY count(*) DESC",
    )
    .bind(since)
    .fetch_all(pool)
    .await
    .map_err(query_err)
}
