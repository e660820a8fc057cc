//! Persona CRUD.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::{query_err, DbPool};
use crate::error::StorageError;
use crate::llm::PersonaVoice;

/// A persona row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Persona {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub bio: String,
    pub tone: String,
    pub writing_samples: Json<Vec<String>>,
    pub do_not_say: Json<Vec<String>>,
    pub catchphrases: Json<Vec<String>>,
    pub preferred_language: String,
    pub formality: i16,
    pub daily_draft_quota: i32,
    pub daily_reply_quota: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Persona {
    /// Project the persona into the shape the LLM prompts need.
    pub fn voice(&self) -> PersonaVoice {
        PersonaVoice {
            name: self.name.clone(),
            bio: self.bio.clone(),
            tone: self.tone.clone(),
            writing_samples: self.writing_samples.0.clone(),
            do_not_say: self.do_not_say.0.clone(),
            catchphrases: self.catchphrases.0.clone(),
            preferred_language: self.preferred_language.clone(),
            formality: self.formality,
        }
    }
}

/// Validated input for creating or updating a persona.
#[derive(Debug, Clone)]
pub struct PersonaInput {
    pub name: String,
    pub bio: String,
    pub tone: String,
    pub writing_samples: Vec<String>,
    pub do_not_say: Vec<String>,
    pub catchphrases: Vec<String>,
    pub preferred_language: String,
    pub formality: i16,
    pub daily_draft_quota: i32,
    pub daily_reply_quota: i32,
}

const SELECT_COLS: &str = "id, user_id, name, bio, tone, writing_samples, do_not_say, \
    catchphrases, preferred_language, formality, daily_draft_quota, daily_reply_quota, \
    created_at, updated_at";

/// Insert a new persona for `user_id`.
pub async fn create(
    pool: &DbPool,
    user_id: Uuid,
    input: &PersonaInput,
) -> Result<Persona, StorageError> {
    let sql = format!(
        "INSERT INTO personas (user_id, name, bio, tone, writing_samples, do_not_say, \
         catchphrases, preferred_language, formality, daily_draft_quota, daily_reply_quota) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING {SELECT_COLS}"
    );
    sqlx::query_as(&sql)
        .bind(user_id)
        .bind(&input.name)
        .bind(&input.bio)
        .bind(&input.tone)
        .bind(Json(&input.writing_samples))
        .bind(Json(&input.do_not_say))
        .bind(Json(&input.catchphrases))
        .bind(&input.preferred_language)
        .bind(input.formality)
        .bind(input.daily_draft_quota)
        .bind(input.daily_reply_quota)
        .fetch_one(pool)
        .await
        .map_err(query_err)
}

/// Fetch a persona by id.
pub async fn get(pool: &DbPool, id: Uuid) -> Result<Option<Persona>, StorageError> {
    let sql = format!("SELECT {SELECT_COLS} FROM personas WHERE id = $1");
    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(query_err)
}

/// All personas owned by `user_id`, oldest first.
pub async fn list_for_user(pool: &DbPool, user_id: Uuid) -> Result<Vec<Persona>, StorageError> {
    let sql = format!("SELECT {SELECT_COLS} FROM personas WHERE user_id = $1 ORDER BY created_at ASC");
    sqlx::query_as(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(query_err)
}

/// Ids of the up-to-`limit` oldest personas owned by `user_id`.
pub async fn oldest_ids_for_user(
    pool: &DbPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<Uuid>, StorageError> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM personas WHERE user_id = $1 ORDER BY created_at ASC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(query_err)?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Replace a persona's mutable fields.
pub async fn update(
    pool: &DbPool,
    id: Uuid,
    input: &PersonaInput,
) -> Result<Persona, StorageError> {
    let sql = format!(
        "UPDATE personas SET name = $2, bio = $3, tone = $4, writing_samples = $5, \
         do_not_say = $6, catchphrases = $7, preferred_language = $8, formality = $9, \
         daily_draft_quota = $10, daily_reply_quota = $11, updated_at = now() \
         WHERE id = $1 RETURNING {SELECT_COLS}"
    );
    sqlx::query_as(&sql)
        .bind(id)
        .bind(&input.name)
        .bind(&input.bio)
        .bind(&input.tone)
        .bind(Json(&input.writing_samples))
        .bind(Json(&input.do_not_say))
        .bind(Json(&input.catchphrases))
        .bind(&input.preferred_language)
        .bind(input.formality)
        .bind(input.daily_draft_quota)
        .bind(input.daily_reply_quota)
        .fetch_one(pool)
        .await
        .map_err(query_err)
}

/// Delete a persona; dependent rows cascade.
pub async fn delete(pool: &DbPool, id: Uuid) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM personas WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(query_err)?;
    Ok(())
}
