//! Per-user weekly digests (derived read model, upserted).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use super::{query_err, DbPool};
use crate::error::StorageError;

/// One highlighted battle within a weekly digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyItem {
    pub battle_id: Uuid,
    pub room_id: Uuid,
    pub room_name: String,
    pub topic: String,
    pub summary: String,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

/// A weekly digest row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WeeklyDigest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub week_start: NaiveDate,
    pub items: Json<Vec<WeeklyItem>>,
    pub updated_at: DateTime<Utc>,
}

/// A battle eligible for a user's weekly digest, with its engagement.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CandidateBattle {
    pub battle_id: Uuid,
    pub room_id: Uuid,
    pub room_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub shares: i64,
    pub remixes: i64,
    pub followed: bool,
}

/// Event names that mark a battle as already seen by the user.
const SEEN_EVENT_NAMES: &str =
    "('public_battle_viewed', 'battle_shared', 'remix_started', 'remix_completed', \
      'notification_clicked')";

/// Upsert the digest for (user, ISO week start).
pub async fn upsert(
    pool: &DbPool,
    user_id: Uuid,
    week_start: NaiveDate,
    items: &[WeeklyItem],
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO weekly_digests (user_id, week_start, items) VALUES ($1, $2, $3) \
         ON CONFLICT ON CONSTRAINT weekly_digests_user_week_key \
         DO UPDATE SET items = EXCLUDED.items, updated_at = now()",
    )
    .bind(user_id)
    .bind(week_start)
    .bind(Json(items))
    .execute(pool)
    .await
    .map_err(query_err)?;
    Ok(())
}

/// Fetch the digest for (user, week start).
pub async fn get(
    pool: &DbPool,
    user_id: Uuid,
    week_start: NaiveDate,
) -> Result<Option<WeeklyDigest>, StorageError> {
    sqlx::query_as(
        "SELECT id, user_id, week_start, items, updated_at \
         FROM weekly_digests WHERE user_id = $1 AND week_start = $2",
    )
    .bind(user_id)
    .bind(week_start)
    .fetch_optional(pool)
    .await
    .map_err(query_err)
}

/// Pick one user whose current-week digest is missing or older than
/// `stale_before`.
pub async fn next_candidate(
    pool: &DbPool,
    week_start: NaiveDate,
    stale_before: DateTime<Utc>,
) -> Result<Option<Uuid>, StorageError> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        "SELECT u.id FROM users u \
         LEFT JOIN weekly_digests w \
           ON w.user_id = u.id AND w.week_start = $1 \
         WHERE w.id IS NULL OR w.updated_at < $2 \
         ORDER BY w.updated_at ASC NULLS FIRST, u.created_at ASC \
         LIMIT 1",
    )
    .bind(week_start)
    .bind(stale_before)
    .fetch_optional(pool)
    .await
    .map_err(query_err)?;
    Ok(row.map(|(id,)| id))
}

/// Battles published in the last 7 days that the user neither authored
/// nor has seen (per the event log, last 14 days), with engagement
/// counts and whether the authoring persona is followed by the user.
pub async fn candidate_battles(
    pool: &DbPool,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<CandidateBattle>, StorageError> {
    let published_cutoff = now - chrono::Duration::days(7);
    let seen_cutoff = now - chrono::Duration::days(14);

    let sql = format!(
        "SELECT p.id AS battle_id, p.room_id, r.name AS room_name, p.content, \
                p.created_at, \
                (SELECT count(*) FROM events e \
                  WHERE e.event_name = 'battle_shared' \
                    AND e.metadata ->> 'battle_id' = p.id::text \
                    AND e.created_at >= $3) AS shares, \
                (SELECT count(*) FROM events e \
                  WHERE e.event_name = 'remix_completed' \
                    AND e.metadata ->> 'battle_id' = p.id::text \
                    AND e.created_at >= $3) AS remixes, \
                EXISTS (SELECT 1 FROM persona_follows f \
                  WHERE f.follower_user_id = $1 \
                    AND f.followed_persona_id = p.persona_id) AS followed \
         FROM posts p \
         JOIN rooms r ON r.id = p.room_id \
         WHERE p.status = 'published' AND p.user_id <> $1 \
           AND p.published_at >= $2 \
           AND NOT EXISTS (SELECT 1 FROM events e \
                 WHERE e.user_id = $1 \
                   AND e.event_name IN {SEEN_EVENT_NAMES} \
                   AND e.metadata ->> 'battle_id' = p.id::text \
                   AND e.created_at >= $3) \
         ORDER BY p.published_at DESC \
         LIMIT 50"
    );

    sqlx::query_as(&sql)
        .bind(user_id)
        .bind(published_cutoff)
        .bind(seen_cutoff)
        .fetch_all(pool)
        .await
        .map_err(query_err)
}
