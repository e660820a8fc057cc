//! Draft approval: the DRAFT → PUBLISHED transition.

use uuid::Uuid;

use super::db_err;
use crate::config::ContentLimits;
use crate::error::DomainError;
use crate::safety::{truncate_preview, validate_content};
use crate::storage::activity::{self, ActivityKind, ActivityMetadata};
use crate::storage::{posts, DbPool};

/// Approve a draft, optionally replacing its content.
///
/// In one transaction: the post becomes PUBLISHED with
/// `authored_by = ai_draft_approved`, and (when a persona authored it)
/// `post_created` and `thread_participated` activity events are
/// recorded. The state check and the update share the row, so a
/// concurrent approval loses cleanly with a conflict.
pub async fn approve(
    pool: &DbPool,
    limits: &ContentLimits,
    user_id: Uuid,
    post_id: Uuid,
    new_content: Option<String>,
) -> Result<posts::Post, DomainError> {
    let post = posts::get(pool, post_id)
        .await?
        .ok_or_else(|| DomainError::NotFound("post not found".to_string()))?;
    if post.user_id != user_id {
        return Err(DomainError::Forbidden("post belongs to another user".to_string()));
    }
    if post.status != "draft" {
        return Err(DomainError::Conflict("post is not a draft".to_string()));
    }

    let effective = match new_content {
        Some(content) if !content.trim().is_empty() => content,
        _ => post.content.clone(),
    };
    let content = validate_content(&effective, limits.draft_max_len)
        .map_err(|violation| DomainError::Validation(violation.to_string()))?;

    let mut tx = pool.begin().await.map_err(db_err)?;

    let published = posts::publish_draft(&mut *tx, post.id, &content)
        .await?
        .ok_or_else(|| DomainError::Conflict("post is not a draft".to_string()))?;

    if let Some(persona_id) = published.persona_id {
        let metadata = ActivityMetadata {
            post_id: published.id,
            room_id: published.room_id,
            post_preview: truncate_preview(&published.content, 220),
            reply_preview: String::new(),
        };
        activity::record(&mut *tx, persona_id, ActivityKind::PostCreated, &metadata).await?;
        activity::record(&mut *tx, persona_id, ActivityKind::ThreadParticipated, &metadata)
            .await?;
    }

    tx.commit().await.map_err(db_err)?;

    tracing::info!(post_id = %published.id, "Draft approved and published");
    Ok(published)
}
