//! Battle templates.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{query_err, DbPool};
use crate::error::StorageError;

/// A template row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Template {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub prompt_rules: String,
    pub turn_count: i32,
    pub word_limit: i32,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

/// A public template with its recent usage count.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TemplateWithUsage {
    pub id: Uuid,
    pub name: String,
    pub turn_count: i32,
    pub word_limit: i32,
    pub created_at: DateTime<Utc>,
    pub usage_count: i64,
}

const SELECT_COLS: &str =
    "id, user_id, name, prompt_rules, turn_count, word_limit, is_public, created_at";

/// Insert a new template.
pub async fn create(
    pool: &DbPool,
    user_id: Uuid,
    name: &str,
    prompt_rules: &str,
    turn_count: i32,
    word_limit: i32,
    is_public: bool,
) -> Result<Template, StorageError> {
    let sql = format!(
        "INSERT INTO templates (user_id, name, prompt_rules, turn_count, word_limit, is_public) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {SELECT_COLS}"
    );
    sqlx::query_as(&sql)
        .bind(user_id)
        .bind(name)
        .bind(prompt_rules)
        .bind(turn_count)
        .bind(word_limit)
        .bind(is_public)
        .fetch_one(pool)
        .await
        .map_err(query_err)
}

/// Fetch a template by id.
pub async fn get(pool: &DbPool, id: Uuid) -> Result<Option<Template>, StorageError> {
    let sql = format!("SELECT {SELECT_COLS} FROM templates WHERE id = $1");
    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(query_err)
}

/// Templates visible to a user: public ones plus their own.
pub async fn list_visible(pool: &DbPool, user_id: Uuid) -> Result<Vec<Template>, StorageError> {
    let sql = format!(
        "SELECT {SELECT_COLS} FROM templates WHERE is_public OR user_id = $1 \
         ORDER BY created_at DESC"
    );
    sqlx::query_as(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(query_err)
}

/// Latest public templates with battles-created usage over the window.
pub async fn latest_public_with_usage(
    pool: &DbPool,
    usage_since: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<TemplateWithUsage>, StorageError> {
    sqlx::query_as(
        "SELECT t.id, t.name, t.turn_count, t.word_limit, t.created_at, \
                (SELECT count(*) FROM posts p \
                  WHERE p.template_id = t.id AND p.created_at >= $1) AS usage_count \
         FROM templates t WHERE t.is_public \
         ORDER BY t.created_at DESC LIMIT $2",
    )
    .bind(usage_since)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(query_err)
}
