//! Topic rooms. Seeded by migration, shared across users.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{query_err, DbPool};
use crate::error::StorageError;

/// A room row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Room {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// All rooms, stable order.
pub async fn list(pool: &DbPool) -> Result<Vec<Room>, StorageError> {
    sqlx::query_as("SELECT id, slug, name, description, created_at FROM rooms ORDER BY slug")
        .fetch_all(pool)
        .await
        .map_err(query_err)
}

/// Fetch a room by id.
pub async fn get(pool: &DbPool, id: Uuid) -> Result<Option<Room>, StorageError> {
    sqlx::query_as("SELECT id, slug, name, description, created_at FROM rooms WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(query_err)
}
