//! The durable job queue.
//!
//! The `jobs` table plays the role of a single-consumer-group queue.
//! Leasing is one short transaction using `FOR UPDATE SKIP LOCKED`, so
//! any number of worker processes can poll the same database without
//! double-dispatch or head-of-line blocking.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use uuid::Uuid;

use super::{query_err, DbPool};
use crate::error::StorageError;
use crate::safety::truncate_runes;

/// Job type for asynchronous reply generation.
pub const JOB_TYPE_GENERATE_REPLY: &str = "generate_reply";

/// Attempts cap; a job at the cap is terminal.
pub const MAX_ATTEMPTS: i32 = 5;

/// Flat backoff applied per transient failure.
pub const BACKOFF_SECONDS: i64 = 30;

/// Stored error messages are truncated to bound row size.
const ERROR_MAX_RUNES: usize = 500;

/// A full job row (inspection and tests).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub post_id: Uuid,
    pub persona_id: Uuid,
    pub payload: Json<Value>,
    pub status: String,
    pub attempts: i32,
    pub available_at: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of a job a worker needs to execute it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeasedJob {
    pub id: Uuid,
    pub job_type: String,
    pub post_id: Uuid,
    pub persona_id: Uuid,
}

/// Insert a new pending job, available immediately.
pub async fn enqueue(
    pool: &DbPool,
    job_type: &str,
    post_id: Uuid,
    persona_id: Uuid,
    payload: &Value,
) -> Result<Uuid, StorageError> {
    let row: (Uuid,) = sqlx::query_as(
        "INSERT INTO jobs (job_type, post_id, persona_id, payload) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(job_type)
    .bind(post_id)
    .bind(persona_id)
    .bind(Json(payload))
    .fetch_one(pool)
    .await
    .map_err(query_err)?;
    Ok(row.0)
}

/// True when a pending or processing job exists for (post, persona).
/// Used as the enqueue-side dedup guard.
pub async fn has_open_job(
    pool: &DbPool,
    post_id: Uuid,
    persona_id: Uuid,
) -> Result<bool, StorageError> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM jobs \
         WHERE post_id = $1 AND persona_id = $2 \
         AND status IN ('pending', 'processing'))",
    )
    .bind(post_id)
    .bind(persona_id)
    .fetch_one(pool)
    .await
    .map_err(query_err)?;
    Ok(row.0)
}

/// Lease the next eligible job, transitioning it to `processing`.
///
/// Eligible: pending, or failed with attempts below the cap, and
/// `available_at` in the past. FIFO by creation time. The SELECT and the
/// UPDATE share one transaction; `SKIP LOCKED` makes concurrent workers
/// pick disjoint rows.
pub async fn lease_next(pool: &DbPool) -> Result<Option<LeasedJob>, StorageError> {
    let mut tx = pool.begin().await.map_err(query_err)?;

    let candidate: Option<LeasedJob> = sqlx::query_as(
        "SELECT id, job_type, post_id, persona_id FROM jobs \
         WHERE status IN ('pending', 'failed') AND attempts < $1 AND available_at <= now() \
         ORDER BY created_at ASC LIMIT 1 FOR UPDATE SKIP LOCKED",
    )
    .bind(MAX_ATTEMPTS)
    .fetch_optional(&mut *tx)
    .await
    .map_err(query_err)?;

    let Some(job) = candidate else {
        tx.rollback().await.map_err(query_err)?;
        return Ok(None);
    };

    sqlx::query(
        "UPDATE jobs SET status = 'processing', locked_at = now(), updated_at = now() \
         WHERE id = $1",
    )
    .bind(job.id)
    .execute(&mut *tx)
    .await
    .map_err(query_err)?;

    tx.commit().await.map_err(query_err)?;
    Ok(Some(job))
}

/// Mark a job done; clears the error and the lease.
pub async fn mark_done(pool: &DbPool, id: Uuid) -> Result<(), StorageError> {
    sqlx::query(
        "UPDATE jobs SET status = 'done', error = NULL, locked_at = NULL, updated_at = now() \
         WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await
    .map_err(query_err)?;
    Ok(())
}

/// Record a transient failure: one more attempt burned, retry eligible
/// after the flat backoff.
pub async fn mark_failed_transient(
    pool: &DbPool,
    id: Uuid,
    error: &str,
) -> Result<(), StorageError> {
    sqlx::query(
        "UPDATE jobs SET status = 'failed', attempts = attempts + 1, error = $2, \
         available_at = now() + make_interval(secs => $3), locked_at = NULL, \
         updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(truncate_runes(error, ERROR_MAX_RUNES))
    .bind(BACKOFF_SECONDS as f64)
    .execute(pool)
    .await
    .map_err(query_err)?;
    Ok(())
}

/// Record a permanent failure: attempts jumps to the cap so the row is
/// terminal but stays inspectable.
pub async fn mark_failed_permanent(
    pool: &DbPool,
    id: Uuid,
    error: &str,
) -> Result<(), StorageError> {
    sqlx::query(
        "UPDATE jobs SET status = 'failed', attempts = $2, error = $3, \
         locked_at = NULL, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(MAX_ATTEMPTS)
    .bind(truncate_runes(error, ERROR_MAX_RUNES))
    .execute(pool)
    .await
    .map_err(query_err)?;
    Ok(())
}

/// Release a lease without burning an attempt (graceful shutdown with a
/// job in flight). The row becomes immediately eligible again.
pub async fn release_lease(pool: &DbPool, id: Uuid) -> Result<(), StorageError> {
    sqlx::query(
        "UPDATE jobs SET status = 'failed', available_at = now(), locked_at = NULL, \
         updated_at = now() WHERE id = $1 AND status = 'processing'",
    )
    .bind(id)
    .execute(pool)
    .await
    .map_err(query_err)?;
    Ok(())
}

/// Fetch a full job row.
pub async fn get(pool: &DbPool, id: Uuid) -> Result<Option<Job>, StorageError> {
    sqlx::query_as(
        "SELECT id, job_type, post_id, persona_id, payload, status, attempts, \
         available_at, locked_at, error, created_at, updated_at FROM jobs WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(query_err)
}

/// Job counts by status (worker metrics).
pub async fn counts_by_status(pool: &DbPool) -> Result<Vec<(String, i64)>, StorageError> {
    sqlx::query_as("SELECT status, count(*) FROM jobs GROUP BY status")
        .fetch_all(pool)
        .await
        .map_err(query_err)
}
