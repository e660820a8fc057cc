//! Draft creation and preview generation.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::load_owned_persona;
use crate::config::ContentLimits;
use crate::error::DomainError;
use crate::llm::{LlmProvider, RoomContext};
use crate::safety::validate_content;
use crate::storage::quota::{self, QuotaType};
use crate::storage::{posts, rooms, DbPool};

/// One preview candidate.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewVariant {
    /// "variant-1" or "variant-2".
    pub label: String,
    pub content: String,
}

/// Generate a persona draft into a room: quota-checked, validated,
/// persisted as a DRAFT post, charged against the `draft` quota in the
/// same transaction.
pub async fn create_draft(
    pool: &DbPool,
    llm: &Arc<dyn LlmProvider>,
    limits: &ContentLimits,
    user_id: Uuid,
    room_id: Uuid,
    persona_id: Uuid,
) -> Result<posts::Post, DomainError> {
    let persona = load_owned_persona(pool, user_id, persona_id).await?;
    let room = rooms::get(pool, room_id)
        .await?
        .ok_or_else(|| DomainError::NotFound("room not found".to_string()))?;

    let now = chrono::Utc::now();
    let used = quota::usage_today(pool, persona.id, QuotaType::Draft, now).await?;
    if used >= i64::from(persona.daily_draft_quota) {
        return Err(DomainError::QuotaExceeded("daily draft quota reached".to_string()));
    }

    let room_context = RoomContext {
        name: room.name.clone(),
        description: room.description.clone(),
    };
    let raw = llm
        .generate_post_draft(&persona.voice(), &room_context, 1)
        .await?;
    let content = validate_content(&raw, limits.draft_max_len)
        .map_err(|violation| DomainError::Validation(violation.to_string()))?;

    let mut tx = pool.begin().await.map_err(super::db_err)?;
    let post = posts::insert_draft(&mut *tx, room.id, persona.id, user_id, &content).await?;
    quota::record(&mut *tx, persona.id, QuotaType::Draft).await?;
    tx.commit().await.map_err(super::db_err)?;

    tracing::info!(
        post_id = %post.id,
        persona_id = %persona.id,
        room = %room.slug,
        "Draft created"
    );
    Ok(post)
}

/// Generate two draft candidates without persisting a post. Charges the
/// `preview` quota once per call.
pub async fn preview(
    pool: &DbPool,
    llm: &Arc<dyn LlmProvider>,
    limits: &ContentLimits,
    user_id: Uuid,
    room_id: Uuid,
    persona_id: Uuid,
    preview_quota: i32,
) -> Result<Vec<PreviewVariant>, DomainError> {
    let persona = load_owned_persona(pool, user_id, persona_id).await?;
    let room = rooms::get(pool, room_id)
        .await?
        .ok_or_else(|| DomainError::NotFound("room not found".to_string()))?;

    let now = chrono::Utc::now();
    let used = quota::usage_today(pool, persona.id, QuotaType::Preview, now).await?;
    if used >= i64::from(preview_quota) {
        return Err(DomainError::QuotaExceeded("daily preview quota reached".to_string()));
    }

    let room_context = RoomContext {
        name: room.name.clone(),
        description: room.description.clone(),
    };
    let voice = persona.voice();

    let mut variants = Vec::with_capacity(2);
    for variant in 1u8..=2 {
        let raw = llm.generate_post_draft(&voice, &room_context, variant).await?;
        let content = validate_content(&raw, limits.draft_max_len)
            .map_err(|violation| DomainError::Validation(violation.to_string()))?;
        variants.push(PreviewVariant {
            label: format!("variant-{variant}"),
            content,
        });
    }

    quota::record(pool, persona.id, QuotaType::Preview).await?;
    Ok(variants)
}
