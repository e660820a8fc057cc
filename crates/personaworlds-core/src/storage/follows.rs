//! Persona follows.

use uuid::Uuid;

use super::{query_err, DbPool};
use crate::error::StorageError;

/// Record a follow. A duplicate surfaces as a unique violation on the
/// composite primary key.
pub async fn create(
    pool: &DbPool,
    follower_user_id: Uuid,
    followed_persona_id: Uuid,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO persona_follows (follower_user_id, followed_persona_id) VALUES ($1, $2)",
    )
    .bind(follower_user_id)
    .bind(followed_persona_id)
    .execute(pool)
    .await
    .map_err(query_err)?;
    Ok(())
}

/// Number of followers of a persona.
pub async fn follower_count(pool: &DbPool, persona_id: Uuid) -> Result<i64, StorageError> {
    let row: (i64,) =
        sqlx::query_as("SELECT count(*) FROM persona_follows WHERE followed_persona_id = $1")
            .bind(persona_id)
            .fetch_one(pool)
            .await
            .map_err(query_err)?;
    Ok(row.0)
}
