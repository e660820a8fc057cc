//! User accounts.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{query_err, DbPool};
use crate::error::StorageError;

/// A user account row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Insert a new user. Emails are stored lower-cased; a duplicate email
/// surfaces as a unique violation on `users_email_key`.
pub async fn create(pool: &DbPool, email: &str, password_hash: &str) -> Result<User, StorageError> {
    sqlx::query_as(
        "INSERT INTO users (email, password_hash) VALUES (lower($1), $2) \
         RETURNING id, email, password_hash, created_at",
    )
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(query_err)
}

/// Look a user up by email (case-insensitive).
pub async fn find_by_email(pool: &DbPool, email: &str) -> Result<Option<User>, StorageError> {
    sqlx::query_as(
        "SELECT id, email, password_hash, created_at FROM users WHERE email = lower($1)",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .map_err(query_err)
}

/// Count users created since `since` (admin analytics).
pub async fn count_since(pool: &DbPool, since: DateTime<Utc>) -> Result<i64, StorageError> {
    let row: (i64,) = sqlx::query_as("SELECT count(*) FROM users WHERE created_at >= $1")
        .bind(since)
        .fetch_one(pool)
        .await
        .map_err(query_err)?;
    Ok(row.0)
}
