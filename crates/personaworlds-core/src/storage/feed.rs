//! Feed source queries: followed battles and trending battles with their
//! 14-day engagement counts from the event log.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{query_err, DbPool};
use crate::error::StorageError;

/// Engagement window for shares/remixes.
pub const ENGAGEMENT_WINDOW_DAYS: i64 = 14;

/// A battle as surfaced into the feed.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedBattle {
    pub post_id: Uuid,
    pub room_id: Uuid,
    pub room_name: String,
    pub persona_id: Option<Uuid>,
    pub content_preview: String,
    pub created_at: DateTime<Utc>,
    pub shares: i64,
    pub remixes: i64,
}

const ENGAGEMENT_COLS: &str = "(SELECT count(*) FROM events e \
      WHERE e.event_name = 'battle_shared' \
        AND e.metadata ->> 'battle_id' = p.id::text \
        AND e.created_at >= $2) AS shares, \
     (SELECT count(*) FROM events e \
      WHERE e.event_name = 'remix_completed' \
        AND e.metadata ->> 'battle_id' = p.id::text \
        AND e.created_at >= $2) AS remixes";

/// Published battles whose persona the user follows, newest first.
pub async fn followed_battles(
    pool: &DbPool,
    user_id: Uuid,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<FeedBattle>, StorageError> {
    let cutoff = now - chrono::Duration::days(ENGAGEMENT_WINDOW_DAYS);
    let sql = format!(
        "SELECT p.id AS post_id, p.room_id, r.name AS room_name, p.persona_id, \
                left(p.content, 220) AS content_preview, p.created_at, {ENGAGEMENT_COLS} \
         FROM posts p \
         JOIN rooms r ON r.id = p.room_id \
         JOIN persona_follows f ON f.followed_persona_id = p.persona_id \
                               AND f.follower_user_id = $1 \
         WHERE p.status = 'published' \
         ORDER BY p.published_at DESC \
         LIMIT $3"
    );
    sqlx::query_as(&sql)
        .bind(user_id)
        .bind(cutoff)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(query_err)
}

/// Published battles not authored by the user with any engagement in the
/// window, hottest first.
pub async fn trending_battles(
    pool: &DbPool,
    user_id: Uuid,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<FeedBattle>, StorageError> {
    let cutoff = now - chrono::Duration::days(ENGAGEMENT_WINDOW_DAYS);
    let sql = format!(
        "SELECT * FROM (\
            SELECT p.id AS post_id, p.room_id, r.name AS room_name, p.persona_id, \
                   left(p.content, 220) AS content_preview, p.created_at, {ENGAGEMENT_COLS} \
            FROM posts p \
            JOIN rooms r ON r.id = p.room_id \
            WHERE p.status = 'published' AND p.user_id <> $1 \
         ) b \
         WHERE b.shares > 0 OR b.remixes > 0 \
         ORDER BY b.shares * 2 + b.remixes * 4 DESC, b.created_at DESC \
         LIMIT $3"
    );
    sqlx::query_as(&sql)
        .bind(user_id)
        .bind(cutoff)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(query_err)
}
