//! Reply-generation enqueueing.
//!
//! Quota is NOT consumed here; the job charges it when it succeeds. The
//! enqueue-side guards (quota headroom, no existing reply, no open job)
//! only keep obviously useless jobs out of the queue.

use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use super::load_owned_persona;
use crate::error::DomainError;
use crate::storage::jobs::{self, JOB_TYPE_GENERATE_REPLY};
use crate::storage::quota::{self, QuotaType};
use crate::storage::{personas, posts, replies, DbPool};

/// How many of the user's oldest personas reply when none are named.
const DEFAULT_PERSONA_COUNT: i64 = 3;

/// Outcome of an enqueue request.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EnqueueSummary {
    pub enqueued: u32,
    pub skipped: u32,
}

/// Enqueue one `generate_reply` job per resolved persona.
///
/// When `persona_ids` is non-empty each must belong to the user;
/// duplicates are collapsed preserving order. When empty, the user's
/// three oldest personas are used.
pub async fn generate_replies(
    pool: &DbPool,
    user_id: Uuid,
    post_id: Uuid,
    persona_ids: Vec<Uuid>,
) -> Result<EnqueueSummary, DomainError> {
    let post = posts::get(pool, post_id)
        .await?
        .ok_or_else(|| DomainError::NotFound("post not found".to_string()))?;
    if !post.is_published() {
        return Err(DomainError::Conflict("post is not published".to_string()));
    }

    let resolved = if persona_ids.is_empty() {
        personas::oldest_ids_for_user(pool, user_id, DEFAULT_PERSONA_COUNT).await?
    } else {
        let mut seen = Vec::with_capacity(persona_ids.len());
        for persona_id in persona_ids {
            if seen.contains(&persona_id) {
                continue;
            }
            load_owned_persona(pool, user_id, persona_id).await?;
            seen.push(persona_id);
        }
        seen
    };

    let now = chrono::Utc::now();
    let mut summary = EnqueueSummary::default();

    for persona_id in resolved {
        let persona = match personas::get(pool, persona_id).await? {
            Some(persona) => persona,
            None => {
                summary.skipped += 1;
                continue;
            }
        };

        let used = quota::usage_today(pool, persona_id, QuotaType::Reply, now).await?;
        if used >= i64::from(persona.daily_reply_quota)
            || replies::exists(pool, post.id, persona_id).await?
            || jobs::has_open_job(pool, post.id, persona_id).await?
        {
            summary.skipped += 1;
            continue;
        }

        let payload = json!({ "requested_by": user_id });
        jobs::enqueue(pool, JOB_TYPE_GENERATE_REPLY, post.id, persona_id, &payload).await?;
        summary.enqueued += 1;
    }

    tracing::info!(
        post_id = %post.id,
        enqueued = summary.enqueued,
        skipped = summary.skipped,
        "Reply jobs enqueued"
    );
    Ok(summary)
}
