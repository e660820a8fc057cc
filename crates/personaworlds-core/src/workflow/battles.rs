//! Battle creation from templates.

use serde_json::json;
use uuid::Uuid;

use crate::config::ContentLimits;
use crate::error::DomainError;
use crate::safety::validate_content;
use crate::storage::notifications::{self, NotificationKind};
use crate::storage::{events, posts, rooms, templates, DbPool};

/// Create a human-authored battle in a room from a template.
///
/// The battle publishes immediately. If the template belongs to another
/// user, they get a `template_used` notification; the event log records
/// a `battle_created` row either way.
pub async fn create_battle(
    pool: &DbPool,
    limits: &ContentLimits,
    user_id: Uuid,
    room_id: Uuid,
    template_id: Uuid,
    opening: &str,
) -> Result<posts::Post, DomainError> {
    let room = rooms::get(pool, room_id)
        .await?
        .ok_or_else(|| DomainError::NotFound("room not found".to_string()))?;
    let template = templates::get(pool, template_id)
        .await?
        .ok_or_else(|| DomainError::NotFound("template not found".to_string()))?;
    if !template.is_public && template.user_id != Some(user_id) {
        return Err(DomainError::Forbidden("template is private".to_string()));
    }

    let content = validate_content(opening, limits.draft_max_len)
        .map_err(|violation| DomainError::Validation(violation.to_string()))?;

    let post = posts::insert_battle(pool, room.id, user_id, &content, template.id).await?;

    events::append(
        pool,
        Some(user_id),
        "battle_created",
        &json!({
            "battle_id": post.id.to_string(),
            "room_id": room.id.to_string(),
            "template_id": template.id.to_string(),
        }),
    )
    .await?;

    if let Some(owner) = template.user_id {
        if owner != user_id {
            notifications::create(
                pool,
                owner,
                Some(user_id),
                NotificationKind::TemplateUsed,
                &format!("Your template \"{}\" was used", template.name),
                "Someone started a battle from your template.",
                &json!({ "template_id": template.id.to_string(), "battle_id": post.id.to_string() }),
            )
            .await?;
        }
    }

    tracing::info!(battle_id = %post.id, template_id = %template.id, "Battle created");
    Ok(post)
}
