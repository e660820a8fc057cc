//! User notifications.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use uuid::Uuid;

use super::{query_err, DbPool};
use crate::error::StorageError;

/// Notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    BattleRemixed,
    TemplateUsed,
    PersonaFollowed,
}

impl NotificationKind {
    /// The stored string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BattleRemixed => "battle_remixed",
            Self::TemplateUsed => "template_used",
            Self::PersonaFollowed => "persona_followed",
        }
    }
}

/// A notification row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub actor_user_id: Option<Uuid>,
    pub notif_type: String,
    pub title: String,
    pub body: String,
    pub metadata: Json<Value>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Create a notification for `user_id`.
pub async fn create(
    pool: &DbPool,
    user_id: Uuid,
    actor_user_id: Option<Uuid>,
    kind: NotificationKind,
    title: &str,
    body: &str,
    metadata: &Value,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO notifications (user_id, actor_user_id, notif_type, title, body, metadata) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(user_id)
    .bind(actor_user_id)
    .bind(kind.as_str())
    .bind(title)
    .bind(body)
    .bind(Json(metadata))
    .execute(pool)
    .await
    .map_err(query_err)?;
    Ok(())
}

/// Latest notifications for a user.
pub async fn list_for_user(
    pool: &DbPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<Notification>, StorageError> {
    sqlx::query_as(
        "SELECT id, user_id, actor_user_id, notif_type, title, body, metadata, read_at, \
                created_at \
         FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(query_err)
}

/// Mark one notification read. Returns false when the notification does
/// not exist or belongs to someone else.
pub async fn mark_read(pool: &DbPool, user_id: Uuid, id: Uuid) -> Result<bool, StorageError> {
    let result = sqlx::query(
        "UPDATE notifications SET read_at = now() \
         WHERE id = $1 AND user_id = $2 AND read_at IS NULL",
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(query_err)?;
    Ok(result.rows_affected() > 0)
}

/// Mark everything read for a user; returns how many rows changed.
pub async fn mark_all_read(pool: &DbPool, user_id: Uuid) -> Result<u64, StorageError> {
    let result =
        sqlx::query("UPDATE notifications SET read_at = now() WHERE user_id = $1 AND read_at IS NULL")
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(query_err)?;
    Ok(result.rows_affected())
}
