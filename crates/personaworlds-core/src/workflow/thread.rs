//! Thread views: a post with its ordered replies and an LLM summary.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::config::ContentLimits;
use crate::error::DomainError;
use crate::llm::LlmProvider;
use crate::safety::truncate_runes;
use crate::storage::posts::Post;
use crate::storage::replies::Reply;
use crate::storage::{posts, replies, DbPool};

/// A post together with its chronologically ordered replies.
#[derive(Debug, Serialize)]
pub struct ThreadView {
    pub post: ThreadPost,
    pub replies: Vec<ThreadReply>,
    pub summary: String,
}

/// Post projection within a thread view.
#[derive(Debug, Serialize)]
pub struct ThreadPost {
    pub id: Uuid,
    pub room_id: Uuid,
    pub persona_id: Option<Uuid>,
    pub authored_by: String,
    pub content: String,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Reply projection within a thread view.
#[derive(Debug, Serialize)]
pub struct ThreadReply {
    pub id: Uuid,
    pub persona_id: Option<Uuid>,
    pub authored_by: String,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ThreadView {
    fn assemble(post: Post, reply_rows: Vec<Reply>, summary: String) -> Self {
        Self {
            post: ThreadPost {
                id: post.id,
                room_id: post.room_id,
                persona_id: post.persona_id,
                authored_by: post.authored_by,
                content: post.content,
                published_at: post.published_at,
            },
            replies: reply_rows
                .into_iter()
                .map(|reply| ThreadReply {
                    id: reply.id,
                    persona_id: reply.persona_id,
                    authored_by: reply.authored_by,
                    content: reply.content,
                    created_at: reply.created_at,
                })
                .collect(),
            summary,
        }
    }
}

/// Load a thread for an authenticated viewer. Drafts are visible only to
/// their owner; published posts to anyone.
pub async fn get_thread(
    pool: &DbPool,
    llm: &Arc<dyn LlmProvider>,
    limits: &ContentLimits,
    viewer: Uuid,
    post_id: Uuid,
) -> Result<ThreadView, DomainError> {
    let post = posts::get(pool, post_id)
        .await?
        .ok_or_else(|| DomainError::NotFound("post not found".to_string()))?;
    if !post.is_published() && post.user_id != viewer {
        return Err(DomainError::NotFound("post not found".to_string()));
    }

    let reply_rows = replies::list_for_post(pool, post.id).await?;
    let reply_texts: Vec<String> = reply_rows.iter().map(|r| r.content.clone()).collect();

    let summary = llm.summarize_thread(&post.content, &reply_texts).await?;
    let summary = truncate_runes(&summary, limits.summary_max_len);

    Ok(ThreadView::assemble(post, reply_rows, summary))
}

/// Load a public thread summary for an anonymous viewer: published posts
/// only.
pub async fn public_summary(
    pool: &DbPool,
    llm: &Arc<dyn LlmProvider>,
    limits: &ContentLimits,
    post_id: Uuid,
) -> Result<String, DomainError> {
    let post = posts::get(pool, post_id)
        .await?
        .ok_or_else(|| DomainError::NotFound("battle not found".to_string()))?;
    if !post.is_published() {
        return Err(DomainError::NotFound("battle not found".to_string()));
    }

    let reply_rows = replies::list_for_post(pool, post.id).await?;
    let reply_texts: Vec<String> = reply_rows.iter().map(|r| r.content.clone()).collect();

    let summary = llm.summarize_thread(&post.content, &reply_texts).await?;
    Ok(truncate_runes(&summary, limits.summary_max_len))
}
