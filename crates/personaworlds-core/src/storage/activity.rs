//! Per-persona activity events.
//!
//! Written in the same transaction as the state change that caused them,
//! consumed by the daily digest builder. Metadata is a tagged payload of
//! known shape, not a free-form map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgExecutor;
use uuid::Uuid;

use super::{query_err, DbPool};
use crate::error::StorageError;

/// Kinds of persona activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    PostCreated,
    ReplyGenerated,
    ThreadParticipated,
}

impl ActivityKind {
    /// The event log's string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PostCreated => "post_created",
            Self::ReplyGenerated => "reply_generated",
            Self::ThreadParticipated => "thread_participated",
        }
    }
}

/// Typed metadata carried by every activity event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityMetadata {
    pub post_id: Uuid,
    pub room_id: Uuid,
    /// Truncated preview of the post content.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub post_preview: String,
    /// Truncated preview of the reply, when the event is reply-shaped.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reply_preview: String,
}

/// Append one activity event. Executor-generic so callers can write it
/// inside the transaction of the triggering state change.
pub async fn record<'e, E: PgExecutor<'e>>(
    executor: E,
    persona_id: Uuid,
    kind: ActivityKind,
    metadata: &ActivityMetadata,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO persona_activity_events (persona_id, event_type, metadata) \
         VALUES ($1, $2, $3)",
    )
    .bind(persona_id)
    .bind(kind.as_str())
    .bind(Json(metadata))
    .execute(executor)
    .await
    .map_err(query_err)?;
    Ok(())
}

/// Post and reply counts for a persona since `since`.
pub async fn counts_since(
    pool: &DbPool,
    persona_id: Uuid,
    since: DateTime<Utc>,
) -> Result<(i64, i64), StorageError> {
    let row: (i64, i64) = sqlx::query_as(
        "SELECT \
            count(*) FILTER (WHERE event_type = 'post_created'), \
            count(*) FILTER (WHERE event_type = 'reply_generated') \
         FROM persona_activity_events WHERE persona_id = $1 AND created_at >= $2",
    )
    .bind(persona_id)
    .bind(since)
    .fetch_one(pool)
    .await
    .map_err(query_err)?;
    Ok(row)
}

/// One of the persona's busiest threads today.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TopThread {
    pub post_id: Uuid,
    pub room_id: Uuid,
    pub room_name: String,
    pub post_preview: String,
    pub activity_count: i64,
    pub last_activity_at: DateTime<Utc>,
}

/// Top `limit` threads by `thread_participated` events since `since`,
/// ties broken by most recent activity.
pub async fn top_threads_since(
    pool: &DbPool,
    persona_id: Uuid,
    since: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<TopThread>, StorageError> {
    sqlx::query_as(
        "SELECT t.post_id, p.room_id, r.name AS room_name, \
                left(p.content, 220) AS post_preview, \
                t.activity_count, t.last_activity_at \
         FROM (SELECT (metadata ->> 'post_id')::uuid AS post_id, \
                      count(*) AS activity_count, \
                      max(created_at) AS last_activity_at \
               FROM persona_activity_events \
               WHERE persona_id = $1 AND event_type = 'thread_participated' \
                 AND created_at >= $2 \
               GROUP BY 1) t \
         JOIN posts p ON p.id = t.post_id \
         JOIN rooms r ON r.id = p.room_id \
         ORDER BY t.activity_count DESC, t.last_activity_at DESC \
         LIMIT $3",
    )
    .bind(persona_id)
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(query_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_kind_strings() {
        assert_eq!(ActivityKind::PostCreated.as_str(), "post_created");
        assert_eq!(ActivityKind::ReplyGenerated.as_str(), "reply_generated");
        assert_eq!(
            ActivityKind::ThreadParticipated.as_str(),
            "thread_participated"
        );
    }

    #[test]
    fn metadata_omits_empty_previews() {
        let metadata = ActivityMetadata {
            post_id: Uuid::nil(),
            room_id: Uuid::nil(),
            post_preview: String::new(),
            reply_preview: String::new(),
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert!(json.get("post_preview").is_none());
        assert!(json.get("reply_preview").is_none());
    }
}
