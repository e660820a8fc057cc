//! Public persona profiles.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{query_err, DbPool};
use crate::error::StorageError;

/// A public profile row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PublicProfile {
    pub id: Uuid,
    pub persona_id: Uuid,
    pub slug: String,
    pub is_public: bool,
    pub bio: String,
    pub created_at: DateTime<Utc>,
}

/// Normalize a display name into a profile slug: lower-cased, ASCII-ish,
/// hyphen-separated.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_dash = true;
    for ch in name.to_lowercase().chars() {
        if ch.is_alphanumeric() {
            slug.push(ch);
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Publish a persona's profile. A slug collision or an already-published
/// persona surfaces as a unique violation.
pub async fn create(
    pool: &DbPool,
    persona_id: Uuid,
    slug: &str,
    bio: &str,
) -> Result<PublicProfile, StorageError> {
    sqlx::query_as(
        "INSERT INTO persona_public_profiles (persona_id, slug, bio) VALUES ($1, $2, $3) \
         RETURNING id, persona_id, slug, is_public, bio, created_at",
    )
    .bind(persona_id)
    .bind(slug)
    .bind(bio)
    .fetch_one(pool)
    .await
    .map_err(query_err)
}

/// Look a public profile up by slug. Hidden profiles are not returned.
pub async fn get_by_slug(pool: &DbPool, slug: &str) -> Result<Option<PublicProfile>, StorageError> {
    sqlx::query_as(
        "SELECT id, persona_id, slug, is_public, bio, created_at \
         FROM persona_public_profiles WHERE slug = $1 AND is_public",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
    .map_err(query_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_normalizes() {
        assert_eq!(slugify("Ayşe the Critic"), "ayşe-the-critic");
        assert_eq!(slugify("  --Weird__name!!  "), "weird-name");
        assert_eq!(slugify("simple"), "simple");
    }

    #[test]
    fn slugify_collapses_runs() {
        assert_eq!(slugify("a   b"), "a-b");
        assert_eq!(slugify("!!!"), "");
    }
}
