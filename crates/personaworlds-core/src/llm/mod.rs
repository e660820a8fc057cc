//! LLM provider abstraction and implementations.
//!
//! The core never branches on provider: everything generation-shaped goes
//! through [`LlmProvider`], implemented by a deterministic mock (dev and
//! tests) and an OpenAI-compatible HTTP client. Selection happens once at
//! startup via [`factory::create_provider`].

pub mod factory;
pub mod mock;
pub mod openai_compat;
pub mod prompts;

use crate::error::LlmError;

/// The voice of a persona, as fed into every generation prompt.
#[derive(Debug, Clone)]
pub struct PersonaVoice {
    /// Display name.
    pub name: String,
    /// Short biography.
    pub bio: String,
    /// Free-form tone description ("dry", "excitable", ...).
    pub tone: String,
    /// Exactly three short writing samples.
    pub writing_samples: Vec<String>,
    /// Phrases the persona must never produce.
    pub do_not_say: Vec<String>,
    /// Optional signature catchphrases.
    pub catchphrases: Vec<String>,
    /// Output language: "tr" or "en".
    pub preferred_language: String,
    /// Formality register 0 (slang) to 3 (formal).
    pub formality: i16,
}

/// The room a draft is being written into.
#[derive(Debug, Clone)]
pub struct RoomContext {
    /// Room display name.
    pub name: String,
    /// Room description.
    pub description: String,
}

/// One message of an existing thread, oldest first.
#[derive(Debug, Clone)]
pub struct ThreadMessage {
    /// Who wrote it ("persona:Ayşe", "human", ...).
    pub author_label: String,
    /// The message content.
    pub content: String,
}

/// A persona's activity for one day, as fed to the digest summarizer.
#[derive(Debug, Clone)]
pub struct ActivitySnapshot {
    /// Posts published today.
    pub posts: i64,
    /// Replies generated today.
    pub replies: i64,
    /// Preview labels of the most active threads, hottest first.
    pub thread_labels: Vec<String>,
}

/// Trait abstracting all LLM generation capabilities the core needs.
///
/// Object-safe for use as `Arc<dyn LlmProvider>` shared between the API
/// process and the worker.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Display name of this provider ("mock", "openai").
    fn name(&self) -> &str;

    /// Draft one post for `persona` in `room`. `variant` disambiguates
    /// preview candidates (1 or 2); plain drafts pass 1.
    async fn generate_post_draft(
        &self,
        persona: &PersonaVoice,
        room: &RoomContext,
        variant: u8,
    ) -> Result<String, LlmError>;

    /// Write `persona`'s reply to a published post given the thread so far.
    async fn generate_reply(
        &self,
        persona: &PersonaVoice,
        post_content: &str,
        thread: &[ThreadMessage],
    ) -> Result<String, LlmError>;

    /// Summarize a post and its replies in a short paragraph.
    async fn summarize_thread(
        &self,
        post_content: &str,
        replies: &[String],
    ) -> Result<String, LlmError>;

    /// Summarize one day of persona activity in the persona's language.
    async fn summarize_persona_activity(
        &self,
        persona: &PersonaVoice,
        activity: &ActivitySnapshot,
    ) -> Result<String, LlmError>;
}
