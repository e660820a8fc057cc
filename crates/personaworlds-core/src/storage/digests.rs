//! Per-persona daily digests (derived read model, upserted).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use super::activity::TopThread;
use super::{query_err, DbPool};
use crate::error::StorageError;

/// Aggregated stats stored alongside the digest summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DigestStats {
    pub posts: i64,
    pub replies: i64,
    pub top_threads: Vec<TopThread>,
}

/// A persona digest row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PersonaDigest {
    pub id: Uuid,
    pub persona_id: Uuid,
    pub digest_date: NaiveDate,
    pub summary: String,
    pub stats: Json<DigestStats>,
    pub updated_at: DateTime<Utc>,
}

/// Upsert the digest for (persona, date).
pub async fn upsert(
    pool: &DbPool,
    persona_id: Uuid,
    digest_date: NaiveDate,
    summary: &str,
    stats: &DigestStats,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO persona_digests (persona_id, digest_date, summary, stats) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT ON CONSTRAINT persona_digests_persona_date_key \
         DO UPDATE SET summary = EXCLUDED.summary, stats = EXCLUDED.stats, \
                       updated_at = now()",
    )
    .bind(persona_id)
    .bind(digest_date)
    .bind(summary)
    .bind(Json(stats))
    .execute(pool)
    .await
    .map_err(query_err)?;
    Ok(())
}

/// Fetch the digest for (persona, date).
pub async fn get(
    pool: &DbPool,
    persona_id: Uuid,
    digest_date: NaiveDate,
) -> Result<Option<PersonaDigest>, StorageError> {
    sqlx::query_as(
        "SELECT id, persona_id, digest_date, summary, stats, updated_at \
         FROM persona_digests WHERE persona_id = $1 AND digest_date = $2",
    )
    .bind(persona_id)
    .bind(digest_date)
    .fetch_optional(pool)
    .await
    .map_err(query_err)
}

/// Pick one persona whose digest for `digest_date` is missing or stale
/// (an activity event since `day_start` postdates the digest's
/// `updated_at`). Ordered to starve no persona.
pub async fn next_candidate(
    pool: &DbPool,
    digest_date: NaiveDate,
    day_start: DateTime<Utc>,
) -> Result<Option<Uuid>, StorageError> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        "SELECT p.id FROM personas p \
         LEFT JOIN persona_digests d \
           ON d.persona_id = p.id AND d.digest_date = $1 \
         WHERE d.id IS NULL \
            OR EXISTS (SELECT 1 FROM persona_activity_events e \
                       WHERE e.persona_id = p.id AND e.created_at >= $2 \
                         AND e.created_at > d.updated_at) \
         ORDER BY d.updated_at ASC NULLS FIRST, p.created_at ASC \
         LIMIT 1",
    )
    .bind(digest_date)
    .bind(day_start)
    .fetch_optional(pool)
    .await
    .map_err(query_err)?;
    Ok(row.map(|(id,)| id))
}
