//! The daily persona digest builder.
//!
//! Each pass refreshes at most one persona: the one whose digest for
//! today is missing or stale relative to new activity. The summary comes
//! from the LLM with a deterministic fallback, so a provider outage
//! degrades the prose, not the pipeline.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::config::ContentLimits;
use crate::error::StorageError;
use crate::llm::{ActivitySnapshot, LlmProvider, PersonaVoice};
use crate::safety::truncate_runes;
use crate::storage::activity::TopThread;
use crate::storage::digests::DigestStats;
use crate::storage::{activity, digests, personas, DbPool};
use crate::timeutil::{start_of_day, today};

/// Storage seam for the digest builder.
#[async_trait::async_trait]
pub trait DigestStore: Send + Sync {
    async fn next_candidate(
        &self,
        digest_date: NaiveDate,
        day_start: DateTime<Utc>,
    ) -> Result<Option<Uuid>, StorageError>;
    async fn load_voice(&self, persona_id: Uuid) -> Result<Option<PersonaVoice>, StorageError>;
    async fn activity_counts(
        &self,
        persona_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<(i64, i64), StorageError>;
    async fn top_threads(
        &self,
        persona_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<TopThread>, StorageError>;
    async fn upsert(
        &self,
        persona_id: Uuid,
        digest_date: NaiveDate,
        summary: &str,
        stats: &DigestStats,
    ) -> Result<(), StorageError>;
}

/// Localized sentence for a day with nothing to report.
fn no_activity_sentence(language: &str) -> &'static str {
    if language == "tr" {
        "Bugün herhangi bir etkinlik olmadı."
    } else {
        "No activity today."
    }
}

/// Deterministic summary used when the LLM is unavailable.
fn fallback_sentence(language: &str, stats: &DigestStats) -> String {
    let labels: Vec<&str> = stats
        .top_threads
        .iter()
        .map(|t| t.room_name.as_str())
        .collect();
    if language == "tr" {
        let mut sentence = format!(
            "Bugün {} gönderi ve {} yanıt paylaşıldı.",
            stats.posts, stats.replies
        );
        if !labels.is_empty() {
            sentence.push_str(&format!(" En hareketli odalar: {}.", labels.join(", ")));
        }
        sentence
    } else {
        let mut sentence = format!(
            "Published {} posts and {} replies today.",
            stats.posts, stats.replies
        );
        if !labels.is_empty() {
            sentence.push_str(&format!(" Busiest rooms: {}.", labels.join(", ")));
        }
        sentence
    }
}

/// Refresh at most one persona digest.
pub async fn run_pass(
    store: &dyn DigestStore,
    llm: &Arc<dyn LlmProvider>,
    limits: &ContentLimits,
) -> Result<(), StorageError> {
    let now = Utc::now();
    let digest_date = today(now);
    let day_start = start_of_day(now);

    let Some(persona_id) = store.next_candidate(digest_date, day_start).await? else {
        return Ok(());
    };
    let Some(voice) = store.load_voice(persona_id).await? else {
        // Persona vanished between candidate selection and load.
        return Ok(());
    };

    let (posts, replies) = store.activity_counts(persona_id, day_start).await?;
    let top_threads = store.top_threads(persona_id, day_start).await?;
    let stats = DigestStats {
        posts,
        replies,
        top_threads,
    };

    let summary = if posts == 0 && replies == 0 && stats.top_threads.is_empty() {
        no_activity_sentence(&voice.preferred_language).to_string()
    } else {
        let snapshot = ActivitySnapshot {
            posts,
            replies,
            thread_labels: stats
                .top_threads
                .iter()
                .map(|t| format!("{}: {}", t.room_name, t.post_preview))
                .collect(),
        };
        match llm.summarize_persona_activity(&voice, &snapshot).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(persona_id = %persona_id, error = %e, "Digest LLM failed, using fallback");
                fallback_sentence(&voice.preferred_language, &stats)
            }
        }
    };

    let summary = truncate_runes(&summary, limits.summary_max_len);
    store.upsert(persona_id, digest_date, &summary, &stats).await?;

    tracing::info!(
        persona_id = %persona_id,
        posts = stats.posts,
        replies = stats.replies,
        "Persona digest refreshed"
    );
    Ok(())
}

/// Production store over the Postgres pool.
pub struct PgDigestStore {
    pool: DbPool,
}

impl PgDigestStore {
    /// Wrap a pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DigestStore for PgDigestStore {
    async fn next_candidate(
        &self,
        digest_date: NaiveDate,
        day_start: DateTime<Utc>,
    ) -> Result<Option<Uuid>, StorageError> {
        digests::next_candidate(&self.pool, digest_date, day_start).await
    }

    async fn load_voice(&self, persona_id: Uuid) -> Result<Option<PersonaVoice>, StorageError> {
        Ok(personas::get(&self.pool, persona_id)
            .await?
            .map(|p| p.voice()))
    }

    async fn activity_counts(
        &self,
        persona_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<(i64, i64), StorageError> {
        activity::counts_since(&self.pool, persona_id, since).await
    }

    async fn top_threads(
        &self,
        persona_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<TopThread>, StorageError> {
        activity::top_threads_since(&self.pool, persona_id, since, 3).await
    }

    async fn upsert(
        &self,
        persona_id: Uuid,
        digest_date: NaiveDate,
        summary: &str,
        stats: &DigestStats,
    ) -> Result<(), StorageError> {
        digests::upsert(&self.pool, persona_id, digest_date, summary, stats).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockProvider;
    use std::sync::Mutex;

    struct MockDigestStore {
        candidate: Option<Uuid>,
        voice: Option<PersonaVoice>,
        counts: (i64, i64),
        threads: Vec<TopThread>,
        upserts: Mutex<Vec<(Uuid, String, DigestStats)>>,
    }

    impl MockDigestStore {
        fn with_candidate(language: &str) -> Self {
            Self {
                candidate: Some(Uuid::new_v4()),
                voice: Some(voice(language)),
                counts: (0, 0),
                threads: Vec::new(),
                upserts: Mutex::new(Vec::new()),
            }
        }

        fn upserted(&self) -> Vec<(Uuid, String, DigestStats)> {
            self.upserts.lock().expect("lock").clone()
        }
    }

    fn voice(language: &str) -> PersonaVoice {
        PersonaVoice {
            name: "Ayşe".to_string(),
            bio: "critic".to_string(),
            tone: "dry".to_string(),
            writing_samples: vec!["a".into(), "b".into(), "c".into()],
            do_not_say: vec![],
            catchphrases: vec![],
            preferred_language: language.to_string(),
            formality: 1,
        }
    }

    fn thread() -> TopThread {
        TopThread {
            post_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            room_name: "Genel".to_string(),
            post_preview: "an opening".to_string(),
            activity_count: 4,
            last_activity_at: Utc::now(),
        }
    }

    #[async_trait::async_trait]
    impl DigestStore for MockDigestStore {
        async fn next_candidate(
            &self,
            _digest_date: NaiveDate,
            _day_start: DateTime<Utc>,
        ) -> Result<Option<Uuid>, StorageError> {
            Ok(self.candidate)
        }

        async fn load_voice(
            &self,
            _persona_id: Uuid,
        ) -> Result<Option<PersonaVoice>, StorageError> {
            Ok(self.voice.clone())
        }

        async fn activity_counts(
            &self,
            _persona_id: Uuid,
            _since: DateTime<Utc>,
        ) -> Result<(i64, i64), StorageError> {
            Ok(self.counts)
        }

        async fn top_threads(
            &self,
            _persona_id: Uuid,
            _since: DateTime<Utc>,
        ) -> Result<Vec<TopThread>, StorageError> {
            Ok(self.threads.clone())
        }

        async fn upsert(
            &self,
            persona_id: Uuid,
            _digest_date: NaiveDate,
            summary: &str,
            stats: &DigestStats,
        ) -> Result<(), StorageError> {
            self.upserts.lock().expect("lock").push((
                persona_id,
                summary.to_string(),
                stats.clone(),
            ));
            Ok(())
        }
    }

    fn limits() -> ContentLimits {
        ContentLimits {
            draft_max_len: 500,
            reply_max_len: 280,
            summary_max_len: 400,
        }
    }

    #[tokio::test]
    async fn no_candidate_is_a_noop() {
        let mut store = MockDigestStore::with_candidate("en");
        store.candidate = None;
        let llm: Arc<dyn LlmProvider> = Arc::new(MockProvider::new());
        run_pass(&store, &llm, &limits()).await.expect("pass");
        assert!(store.upserted().is_empty());
    }

    #[tokio::test]
    async fn quiet_day_writes_localized_sentence() {
        let store = MockDigestStore::with_candidate("tr");
        let llm: Arc<dyn LlmProvider> = Arc::new(MockProvider::new());
        run_pass(&store, &llm, &limits()).await.expect("pass");

        let upserts = store.upserted();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].1, "Bugün herhangi bir etkinlik olmadı.");
        assert_eq!(upserts[0].2.posts, 0);
    }

    #[tokio::test]
    async fn active_day_uses_llm_summary() {
        let mut store = MockDigestStore::with_candidate("en");
        store.counts = (2, 3);
        store.threads = vec![thread()];
        let llm: Arc<dyn LlmProvider> = Arc::new(MockProvider::new());
        run_pass(&store, &llm, &limits()).await.expect("pass");

        let upserts = store.upserted();
        assert_eq!(upserts.len(), 1);
        assert!(upserts[0].1.contains('2'));
        assert_eq!(upserts[0].2.top_threads.len(), 1);
    }

    #[tokio::test]
    async fn llm_failure_falls_back_deterministically() {
        let mut store = MockDigestStore::with_candidate("en");
        store.counts = (1, 0);
        let llm: Arc<dyn LlmProvider> = Arc::new(MockProvider::with_failures(1));
        run_pass(&store, &llm, &limits()).await.expect("pass");

        let upserts = store.upserted();
        assert_eq!(upserts[0].1, "Published 1 posts and 0 replies today.");
    }

    #[tokio::test]
    async fn summary_is_truncated_to_cap() {
        let mut store = MockDigestStore::with_candidate("en");
        store.counts = (1, 1);
        let llm: Arc<dyn LlmProvider> = Arc::new(MockProvider::new());
        let tight = ContentLimits {
            draft_max_len: 500,
            reply_max_len: 280,
            summary_max_len: 10,
        };
        run_pass(&store, &llm, &tight).await.expect("pass");
        assert!(store.upserted()[0].1.chars().count() <= 10);
    }
}
