//! Deterministic in-process LLM provider.
//!
//! Default for local development and tests: no network, stable output
//! derived from its inputs. An optional failure budget makes the first N
//! calls fail with an API error, which is how retry behavior is exercised
//! end to end.

use std::sync::atomic::{AtomicU32, Ordering};

use super::{ActivitySnapshot, LlmProvider, PersonaVoice, RoomContext, ThreadMessage};
use crate::error::LlmError;

/// LLM provider that fabricates plausible content locally.
pub struct MockProvider {
    failures_remaining: AtomicU32,
}

impl MockProvider {
    /// A mock that always succeeds.
    pub fn new() -> Self {
        Self {
            failures_remaining: AtomicU32::new(0),
        }
    }

    /// A mock whose first `n` calls fail with a 503-style API error.
    pub fn with_failures(n: u32) -> Self {
        Self {
            failures_remaining: AtomicU32::new(n),
        }
    }

    fn maybe_fail(&self) -> Result<(), LlmError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(LlmError::Api {
                status: 503,
                message: "mock provider failure budget".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_post_draft(
        &self,
        persona: &PersonaVoice,
        room: &RoomContext,
        variant: u8,
    ) -> Result<String, LlmError> {
        self.maybe_fail()?;
        let angle = if variant >= 2 { "counterpoint" } else { "take" };
        Ok(format!(
            "{name}'s {angle} on {room}: {bio_word} thoughts, {tone} as always.",
            name = persona.name,
            room = room.name,
            bio_word = persona
                .bio
                .split_whitespace()
                .next()
                .unwrap_or("fresh"),
            tone = persona.tone,
        ))
    }

    async fn generate_reply(
        &self,
        persona: &PersonaVoice,
        post_content: &str,
        thread: &[ThreadMessage],
    ) -> Result<String, LlmError> {
        self.maybe_fail()?;
        let opener: String = post_content.chars().take(40).collect();
        Ok(format!(
            "{name} replying (after {count} others): on \"{opener}\" I'd say the {tone} view holds.",
            name = persona.name,
            count = thread.len(),
            tone = persona.tone,
        ))
    }

    async fn summarize_thread(
        &self,
        post_content: &str,
        replies: &[String],
    ) -> Result<String, LlmError> {
        self.maybe_fail()?;
        let opener: String = post_content.chars().take(60).collect();
        Ok(format!(
            "A discussion of \"{opener}\" with {count} replies, opinions split.",
            count = replies.len(),
        ))
    }

    async fn summarize_persona_activity(
        &self,
        persona: &PersonaVoice,
        activity: &ActivitySnapshot,
    ) -> Result<String, LlmError> {
        self.maybe_fail()?;
        if persona.preferred_language == "tr" {
            Ok(format!(
                "{name} bugün {posts} gönderi ve {replies} yanıt paylaştı.",
                name = persona.name,
                posts = activity.posts,
                replies = activity.replies,
            ))
        } else {
            Ok(format!(
                "{name} published {posts} posts and {replies} replies today.",
                name = persona.name,
                posts = activity.posts,
                replies = activity.replies,
            ))
        }
    }
}
