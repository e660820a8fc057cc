//! Execution of `generate_reply` jobs.
//!
//! Failure classification is by type, never by inspection of message
//! strings: anything that can never succeed on retry (persona gone, post
//! unpublished, reply already present, quota reached, safety rejection,
//! unknown job type) is permanent and pins attempts at the cap; LLM and
//! database errors are transient and retried with flat backoff.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ContentLimits;
use crate::error::{LlmError, StorageError};
use crate::llm::{LlmProvider, PersonaVoice, ThreadMessage};
use crate::safety::{truncate_preview, validate_content};
use crate::storage::activity::{ActivityKind, ActivityMetadata};
use crate::storage::jobs::{self, LeasedJob, JOB_TYPE_GENERATE_REPLY};
use crate::storage::quota::QuotaType;
use crate::storage::replies::REPLY_DEDUP_CONSTRAINT;
use crate::storage::{activity, quota, replies, DbPool};

/// Why a job execution failed.
#[derive(Debug)]
pub enum JobFailure {
    /// No future attempt can succeed; the job becomes terminal.
    Permanent(String),
    /// Worth retrying after backoff.
    Transient(String),
}

impl JobFailure {
    /// The message stored in the job's `error` column.
    pub fn message(&self) -> &str {
        match self {
            Self::Permanent(msg) | Self::Transient(msg) => msg,
        }
    }
}

/// Persona projection the executor needs.
#[derive(Debug, Clone)]
pub struct ReplyPersona {
    pub id: Uuid,
    pub user_id: Uuid,
    pub daily_reply_quota: i32,
    pub voice: PersonaVoice,
}

/// Post projection the executor needs.
#[derive(Debug, Clone)]
pub struct ReplyPost {
    pub id: Uuid,
    pub room_id: Uuid,
    pub content: String,
    pub published: bool,
}

/// Result of the atomic reply persistence step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Reply, quota event, and activity events committed.
    Inserted,
    /// Another worker already replied for this (post, persona).
    DuplicateReply,
}

/// Storage seam for reply job execution.
#[async_trait::async_trait]
pub trait ReplyJobStore: Send + Sync {
    async fn load_persona(&self, persona_id: Uuid) -> Result<Option<ReplyPersona>, StorageError>;
    async fn reply_quota_used_today(&self, persona_id: Uuid) -> Result<i64, StorageError>;
    async fn load_post(&self, post_id: Uuid) -> Result<Option<ReplyPost>, StorageError>;
    async fn reply_exists(&self, post_id: Uuid, persona_id: Uuid) -> Result<bool, StorageError>;
    async fn load_thread(&self, post_id: Uuid) -> Result<Vec<ThreadMessage>, StorageError>;

    /// In one transaction: insert the AI reply, charge the `reply`
    /// quota, and record `reply_generated` + `thread_participated`
    /// activity events.
    async fn persist_reply(
        &self,
        post: &ReplyPost,
        persona: &ReplyPersona,
        content: &str,
    ) -> Result<PersistOutcome, StorageError>;
}

/// Execute one `generate_reply` job.
pub async fn execute_generate_reply(
    store: &dyn ReplyJobStore,
    llm: &Arc<dyn LlmProvider>,
    limits: &ContentLimits,
    post_id: Uuid,
    persona_id: Uuid,
) -> Result<(), JobFailure> {
    let persona = store
        .load_persona(persona_id)
        .await
        .map_err(transient)?
        .ok_or_else(|| JobFailure::Permanent("persona not found".to_string()))?;

    let used = store
        .reply_quota_used_today(persona_id)
        .await
        .map_err(transient)?;
    if used >= i64::from(persona.daily_reply_quota) {
        return Err(JobFailure::Permanent("daily reply quota reached".to_string()));
    }

    let post = store
        .load_post(post_id)
        .await
        .map_err(transient)?
        .ok_or_else(|| JobFailure::Permanent("post not found".to_string()))?;
    if !post.published {
        return Err(JobFailure::Permanent("post is not published".to_string()));
    }

    if store
        .reply_exists(post_id, persona_id)
        .await
        .map_err(transient)?
    {
        return Err(JobFailure::Permanent("reply already exists".to_string()));
    }

    let thread = store.load_thread(post_id).await.map_err(transient)?;

    let raw = llm
        .generate_reply(&persona.voice, &post.content, &thread)
        .await
        .map_err(|e: LlmError| JobFailure::Transient(e.to_string()))?;

    let content = validate_content(&raw, limits.reply_max_len).map_err(|violation| {
        JobFailure::Permanent(format!("content failed safety validation: {violation}"))
    })?;

    match store.persist_reply(&post, &persona, &content).await {
        Ok(PersistOutcome::Inserted) => Ok(()),
        Ok(PersistOutcome::DuplicateReply) => {
            Err(JobFailure::Permanent("reply already exists".to_string()))
        }
        Err(e) => Err(transient(e)),
    }
}

fn transient(e: StorageError) -> JobFailure {
    JobFailure::Transient(e.to_string())
}

/// Lease and run at most one job; record the outcome on the row.
///
/// A cancellation mid-execution releases the lease (attempts unchanged,
/// immediately eligible) so another worker picks the job up.
pub async fn job_queue_pass(
    pool: &DbPool,
    store: &dyn ReplyJobStore,
    llm: &Arc<dyn LlmProvider>,
    limits: &ContentLimits,
    cancel: &CancellationToken,
) -> Result<(), StorageError> {
    let Some(job) = jobs::lease_next(pool).await? else {
        return Ok(());
    };

    tracing::debug!(job_id = %job.id, job_type = %job.job_type, "Job leased");

    let outcome = tokio::select! {
        () = cancel.cancelled() => {
            tracing::info!(job_id = %job.id, "Cancelled mid-job, releasing lease");
            jobs::release_lease(pool, job.id).await?;
            return Ok(());
        }
        outcome = dispatch(store, llm, limits, &job) => outcome,
    };

    match outcome {
        Ok(()) => {
            jobs::mark_done(pool, job.id).await?;
            tracing::info!(job_id = %job.id, "Job done");
        }
        Err(JobFailure::Permanent(message)) => {
            jobs::mark_failed_permanent(pool, job.id, &message).await?;
            tracing::warn!(job_id = %job.id, error = %message, "Job failed permanently");
        }
        Err(JobFailure::Transient(message)) => {
            jobs::mark_failed_transient(pool, job.id, &message).await?;
            tracing::warn!(job_id = %job.id, error = %message, "Job failed, will retry");
        }
    }
    Ok(())
}

async fn dispatch(
    store: &dyn ReplyJobStore,
    llm: &Arc<dyn LlmProvider>,
    limits: &ContentLimits,
    job: &LeasedJob,
) -> Result<(), JobFailure> {
    if job.job_type != JOB_TYPE_GENERATE_REPLY {
        return Err(JobFailure::Permanent(format!(
            "unsupported job type: {}",
            job.job_type
        )));
    }
    execute_generate_reply(store, llm, limits, job.post_id, job.persona_id).await
}

/// Production store over the Postgres pool.
pub struct PgReplyJobStore {
    pool: DbPool,
}

impl PgReplyJobStore {
    /// Wrap a pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReplyJobStore for PgReplyJobStore {
    async fn load_persona(&self, persona_id: Uuid) -> Result<Option<ReplyPersona>, StorageError> {
        let persona = crate::storage::personas::get(&self.pool, persona_id).await?;
        Ok(persona.map(|p| ReplyPersona {
            id: p.id,
            user_id: p.user_id,
            daily_reply_quota: p.daily_reply_quota,
            voice: p.voice(),
        }))
    }

    async fn reply_quota_used_today(&self, persona_id: Uuid) -> Result<i64, StorageError> {
        quota::usage_today(&self.pool, persona_id, QuotaType::Reply, chrono::Utc::now()).await
    }

    async fn load_post(&self, post_id: Uuid) -> Result<Option<ReplyPost>, StorageError> {
        let post = crate::storage::posts::get(&self.pool, post_id).await?;
        Ok(post.map(|p| ReplyPost {
            id: p.id,
            room_id: p.room_id,
            published: p.is_published(),
            content: p.content,
        }))
    }

    async fn reply_exists(&self, post_id: Uuid, persona_id: Uuid) -> Result<bool, StorageError> {
        replies::exists(&self.pool, post_id, persona_id).await
    }

    async fn load_thread(&self, post_id: Uuid) -> Result<Vec<ThreadMessage>, StorageError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT COALESCE(p.name, r.authored_by) AS author_label, r.content \
             FROM replies r LEFT JOIN personas p ON p.id = r.persona_id \
             WHERE r.post_id = $1 ORDER BY r.created_at ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;

        Ok(rows
            .into_iter()
            .map(|(author_label, content)| ThreadMessage {
                author_label,
                content,
            })
            .collect())
    }

    async fn persist_reply(
        &self,
        post: &ReplyPost,
        persona: &ReplyPersona,
        content: &str,
    ) -> Result<PersistOutcome, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Query { source: e })?;

        let reply =
            match replies::insert_ai(&mut *tx, post.id, persona.id, persona.user_id, content)
                .await
            {
                Ok(reply) => reply,
                Err(e) if e.is_unique_violation(Some(REPLY_DEDUP_CONSTRAINT)) => {
                    tx.rollback()
                        .await
                        .map_err(|e| StorageError::Query { source: e })?;
                    return Ok(PersistOutcome::DuplicateReply);
                }
                Err(e) => return Err(e),
            };

        quota::record(&mut *tx, persona.id, QuotaType::Reply).await?;

        let metadata = ActivityMetadata {
            post_id: post.id,
            room_id: post.room_id,
            post_preview: truncate_preview(&post.content, 220),
            reply_preview: truncate_preview(&reply.content, 220),
        };
        activity::record(&mut *tx, persona.id, ActivityKind::ReplyGenerated, &metadata).await?;
        activity::record(
            &mut *tx,
            persona.id,
            ActivityKind::ThreadParticipated,
            &metadata,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Query { source: e })?;
        Ok(PersistOutcome::Inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockProvider;
    use std::sync::Mutex;

    struct MockStore {
        persona: Option<ReplyPersona>,
        quota_used: i64,
        post: Option<ReplyPost>,
        existing_reply: bool,
        persist_outcome: PersistOutcome,
        persisted: Mutex<Vec<String>>,
    }

    impl MockStore {
        fn happy() -> Self {
            Self {
                persona: Some(persona()),
                quota_used: 0,
                post: Some(post(true)),
                existing_reply: false,
                persist_outcome: PersistOutcome::Inserted,
                persisted: Mutex::new(Vec::new()),
            }
        }

        fn persisted_count(&self) -> usize {
            self.persisted.lock().expect("lock").len()
        }
    }

    fn persona() -> ReplyPersona {
        ReplyPersona {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            daily_reply_quota: 25,
            voice: PersonaVoice {
                name: "Ali".to_string(),
                bio: "gardener".to_string(),
                tone: "calm".to_string(),
                writing_samples: vec!["a".into(), "b".into(), "c".into()],
                do_not_say: vec![],
                catchphrases: vec![],
                preferred_language: "en".to_string(),
                formality: 2,
            },
        }
    }

    fn post(published: bool) -> ReplyPost {
        ReplyPost {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            content: "An opening statement worth replying to.".to_string(),
            published,
        }
    }

    #[async_trait::async_trait]
    impl ReplyJobStore for MockStore {
        async fn load_persona(
            &self,
            _persona_id: Uuid,
        ) -> Result<Option<ReplyPersona>, StorageError> {
            Ok(self.persona.clone())
        }

        async fn reply_quota_used_today(&self, _persona_id: Uuid) -> Result<i64, StorageError> {
            Ok(self.quota_used)
        }

        async fn load_post(&self, _post_id: Uuid) -> Result<Option<ReplyPost>, StorageError> {
            Ok(self.post.clone())
        }

        async fn reply_exists(
            &self,
            _post_id: Uuid,
            _persona_id: Uuid,
        ) -> Result<bool, StorageError> {
            Ok(self.existing_reply)
        }

        async fn load_thread(&self, _post_id: Uuid) -> Result<Vec<ThreadMessage>, StorageError> {
            Ok(Vec::new())
        }

        async fn persist_reply(
            &self,
            _post: &ReplyPost,
            _persona: &ReplyPersona,
            content: &str,
        ) -> Result<PersistOutcome, StorageError> {
            if self.persist_outcome == PersistOutcome::Inserted {
                self.persisted.lock().expect("lock").push(content.to_string());
            }
            Ok(self.persist_outcome)
        }
    }

    fn limits() -> ContentLimits {
        ContentLimits {
            draft_max_len: 500,
            reply_max_len: 280,
            summary_max_len: 400,
        }
    }

    fn llm() -> Arc<dyn LlmProvider> {
        Arc::new(MockProvider::new())
    }

    #[tokio::test]
    async fn happy_path_persists_reply() {
        let store = MockStore::happy();
        let result =
            execute_generate_reply(&store, &llm(), &limits(), Uuid::new_v4(), Uuid::new_v4())
                .await;
        assert!(result.is_ok());
        assert_eq!(store.persisted_count(), 1);
    }

    #[tokio::test]
    async fn missing_persona_is_permanent() {
        let mut store = MockStore::happy();
        store.persona = None;
        let err =
            execute_generate_reply(&store, &llm(), &limits(), Uuid::new_v4(), Uuid::new_v4())
                .await
                .expect_err("should fail");
        assert!(matches!(err, JobFailure::Permanent(ref msg) if msg == "persona not found"));
    }

    #[tokio::test]
    async fn quota_reached_is_permanent() {
        let mut store = MockStore::happy();
        store.quota_used = 25;
        let err =
            execute_generate_reply(&store, &llm(), &limits(), Uuid::new_v4(), Uuid::new_v4())
                .await
                .expect_err("should fail");
        assert!(
            matches!(err, JobFailure::Permanent(ref msg) if msg == "daily reply quota reached")
        );
        assert_eq!(store.persisted_count(), 0);
    }

    #[tokio::test]
    async fn missing_post_is_permanent() {
        let mut store = MockStore::happy();
        store.post = None;
        let err =
            execute_generate_reply(&store, &llm(), &limits(), Uuid::new_v4(), Uuid::new_v4())
                .await
                .expect_err("should fail");
        assert!(matches!(err, JobFailure::Permanent(ref msg) if msg == "post not found"));
    }

    #[tokio::test]
    async fn unpublished_post_is_permanent() {
        let mut store = MockStore::happy();
        store.post = Some(post(false));
        let err =
            execute_generate_reply(&store, &llm(), &limits(), Uuid::new_v4(), Uuid::new_v4())
                .await
                .expect_err("should fail");
        assert!(matches!(err, JobFailure::Permanent(ref msg) if msg == "post is not published"));
    }

    #[tokio::test]
    async fn existing_reply_is_permanent() {
        let mut store = MockStore::happy();
        store.existing_reply = true;
        let err =
            execute_generate_reply(&store, &llm(), &limits(), Uuid::new_v4(), Uuid::new_v4())
                .await
                .expect_err("should fail");
        assert!(matches!(err, JobFailure::Permanent(ref msg) if msg == "reply already exists"));
    }

    #[tokio::test]
    async fn llm_failure_is_transient() {
        let store = MockStore::happy();
        let failing: Arc<dyn LlmProvider> = Arc::new(MockProvider::with_failures(1));
        let err =
            execute_generate_reply(&store, &failing, &limits(), Uuid::new_v4(), Uuid::new_v4())
                .await
                .expect_err("should fail");
        assert!(matches!(err, JobFailure::Transient(_)));
    }

    #[tokio::test]
    async fn race_loser_is_permanent() {
        let mut store = MockStore::happy();
        store.persist_outcome = PersistOutcome::DuplicateReply;
        let err =
            execute_generate_reply(&store, &llm(), &limits(), Uuid::new_v4(), Uuid::new_v4())
                .await
                .expect_err("should fail");
        assert!(matches!(err, JobFailure::Permanent(ref msg) if msg == "reply already exists"));
    }

    #[tokio::test]
    async fn overlong_generation_is_permanent() {
        let store = MockStore::happy();
        let tight = ContentLimits {
            draft_max_len: 500,
            reply_max_len: 5,
            summary_max_len: 400,
        };
        let err =
            execute_generate_reply(&store, &llm(), &tight, Uuid::new_v4(), Uuid::new_v4())
                .await
                .expect_err("should fail");
        assert!(
            matches!(err, JobFailure::Permanent(ref msg) if msg.starts_with("content failed safety validation"))
        );
    }
}
