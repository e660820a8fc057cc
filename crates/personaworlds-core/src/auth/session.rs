//! Session management backed by the database.
//!
//! Sessions are created on signup and login, and stored as SHA-256
//! hashes of the raw token.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AuthError;
use crate::storage::DbPool;

/// Session lifetime: 30 days.
const SESSION_LIFETIME_DAYS: i64 = 30;

/// Result of creating a new session: the raw token for the client.
pub struct NewSession {
    /// The opaque bearer token; shown once, never stored in the clear.
    pub raw_token: String,
    /// When the session expires.
    pub expires_at: DateTime<Utc>,
}

/// SHA-256 hash a raw token for storage.
fn hash_token(raw_token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a cryptographically random hex string.
fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(&buf)
}

/// Create a new session for `user_id` and return its raw token.
pub async fn create_session(pool: &DbPool, user_id: Uuid) -> Result<NewSession, AuthError> {
    let raw_token = random_hex(32);
    let token_hash = hash_token(&raw_token);
    let expires_at = Utc::now() + Duration::days(SESSION_LIFETIME_DAYS);

    sqlx::query(
        "INSERT INTO sessions (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
    )
    .bind(user_id)
    .bind(&token_hash)
    .bind(expires_at)
    .execute(pool)
    .await
    .map_err(|e| AuthError::Database { source: e })?;

    Ok(NewSession {
        raw_token,
        expires_at,
    })
}

/// Validate a bearer token. Returns the owning user id if the session is
/// live, updating `last_accessed_at` on the way.
pub async fn validate_session(pool: &DbPool, raw_token: &str) -> Result<Option<Uuid>, AuthError> {
    let token_hash = hash_token(raw_token);

    let row: Option<(Uuid,)> = sqlx::query_as(
        "UPDATE sessions SET last_accessed_at = now() \
         WHERE token_hash = $1 AND expires_at > now() \
         RETURNING user_id",
    )
    .bind(&token_hash)
    .fetch_optional(pool)
    .await
    .map_err(|e| AuthError::Database { source: e })?;

    Ok(row.map(|(user_id,)| user_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_stable_and_hex() {
        let first = hash_token("abc");
        let second = hash_token("abc");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(hash_token("abd"), first);
    }

    #[test]
    fn random_hex_has_expected_entropy() {
        let a = random_hex(32);
        let b = random_hex(32);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
