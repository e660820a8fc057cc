//! The weekly digest builder.
//!
//! Each pass refreshes at most one user: the one whose current-ISO-week
//! digest is missing or older than the staleness threshold. Candidate
//! battles are scored, the top three summarized, and the result upserted
//! on (user, week start).

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::StorageError;
use crate::llm::LlmProvider;
use crate::safety::truncate_runes;
use crate::storage::weekly::{CandidateBattle, WeeklyItem};
use crate::storage::{replies, weekly, DbPool};
use crate::timeutil::{age_hours, week_start};

/// A digest older than this is refreshed.
const STALE_AFTER_HOURS: i64 = 6;

/// At most this many battles per weekly digest.
const MAX_ITEMS: usize = 3;

/// Bonus when the battle's persona is followed by the user.
const FOLLOWED_BONUS: f64 = 6.0;

/// Topic lines are capped at this many runes.
const TOPIC_MAX_RUNES: usize = 140;

/// How many of the earliest replies feed the thread summarizer.
const SUMMARY_REPLY_COUNT: i64 = 4;

/// Storage seam for the weekly digest builder.
#[async_trait::async_trait]
pub trait WeeklyStore: Send + Sync {
    async fn next_candidate(
        &self,
        week: NaiveDate,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<Uuid>, StorageError>;
    async fn candidate_battles(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<CandidateBattle>, StorageError>;
    async fn earliest_replies(
        &self,
        battle_id: Uuid,
        limit: i64,
    ) -> Result<Vec<String>, StorageError>;
    async fn upsert(
        &self,
        user_id: Uuid,
        week: NaiveDate,
        items: &[WeeklyItem],
    ) -> Result<(), StorageError>;
}

/// Score a candidate battle for inclusion.
pub fn score_battle(battle: &CandidateBattle, now: DateTime<Utc>) -> f64 {
    let followed = if battle.followed { FOLLOWED_BONUS } else { 0.0 };
    let freshness = (96 - age_hours(now, battle.created_at)).max(0) as f64;
    followed + battle.shares as f64 * 2.0 + battle.remixes as f64 * 3.0 + freshness
}

/// Extract a battle's topic: the remainder of the first line starting
/// with "Topic:", otherwise the first sentence. Capped at 140 runes.
pub fn extract_topic(content: &str) -> String {
    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("Topic:") {
            return truncate_runes(rest.trim(), TOPIC_MAX_RUNES);
        }
    }

    let first = content.trim();
    let sentence_end = first
        .char_indices()
        .find(|(_, ch)| matches!(ch, '.' | '!' | '?'))
        .map(|(idx, ch)| idx + ch.len_utf8());
    let sentence = match sentence_end {
        Some(end) => &first[..end],
        None => first,
    };
    truncate_runes(sentence.trim(), TOPIC_MAX_RUNES)
}

/// Deterministic item summary used when the LLM fails or returns
/// nothing.
pub fn fallback_summary(topic: &str, shares: i64, remixes: i64) -> String {
    match (shares, remixes) {
        (0, 0) => format!("{topic} sparked a fresh discussion this week."),
        (s, 0) => format!("{topic} gained traction this week with {s} shares."),
        (0, r) => format!("{topic} gained traction this week with {r} remixes."),
        (s, r) => format!("{topic} gained traction this week with {s} shares and {r} remixes."),
    }
}

/// Refresh at most one user's weekly digest.
pub async fn run_pass(
    store: &dyn WeeklyStore,
    llm: &Arc<dyn LlmProvider>,
) -> Result<(), StorageError> {
    let now = Utc::now();
    let week = week_start(now);
    let stale_before = now - Duration::hours(STALE_AFTER_HOURS);

    let Some(user_id) = store.next_candidate(week, stale_before).await? else {
        return Ok(());
    };

    let mut battles = store.candidate_battles(user_id, now).await?;
    battles.sort_by(|a, b| {
        score_battle(b, now)
            .partial_cmp(&score_battle(a, now))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.created_at.cmp(&a.created_at))
    });
    battles.truncate(MAX_ITEMS);

    let mut items = Vec::with_capacity(battles.len());
    for battle in &battles {
        let topic = extract_topic(&battle.content);

        let reply_texts = store
            .earliest_replies(battle.battle_id, SUMMARY_REPLY_COUNT)
            .await?;
        let summary = match llm.summarize_thread(&battle.content, &reply_texts).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) | Err(_) => fallback_summary(&topic, battle.shares, battle.remixes),
        };

        items.push(WeeklyItem {
            battle_id: battle.battle_id,
            room_id: battle.room_id,
            room_name: battle.room_name.clone(),
            topic,
            summary,
            score: score_battle(battle, now),
            created_at: battle.created_at,
        });
    }

    store.upsert(user_id, week, &items).await?;
    tracing::info!(user_id = %user_id, items = items.len(), "Weekly digest refreshed");
    Ok(())
}

/// Production store over the Postgres pool.
pub struct PgWeeklyStore {
    pool: DbPool,
}

impl PgWeeklyStore {
    /// Wrap a pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl WeeklyStore for PgWeeklyStore {
    async fn next_candidate(
        &self,
        week: NaiveDate,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<Uuid>, StorageError> {
        weekly::next_candidate(&self.pool, week, stale_before).await
    }

    async fn candidate_battles(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<CandidateBattle>, StorageError> {
        weekly::candidate_battles(&self.pool, user_id, now).await
    }

    async fn earliest_replies(
        &self,
        battle_id: Uuid,
        limit: i64,
    ) -> Result<Vec<String>, StorageError> {
        let rows = replies::list_earliest_for_post(&self.pool, battle_id, limit).await?;
        Ok(rows.into_iter().map(|r| r.content).collect())
    }

    async fn upsert(
        &self,
        user_id: Uuid,
        week: NaiveDate,
        items: &[WeeklyItem],
    ) -> Result<(), StorageError> {
        weekly::upsert(&self.pool, user_id, week, items).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockProvider;
    use std::sync::Mutex;

    fn candidate(hours_old: i64, shares: i64, remixes: i64, followed: bool) -> CandidateBattle {
        CandidateBattle {
            battle_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            room_name: "Genel".to_string(),
            content: "Topic: Are cats better debaters?\nOpening statement.".to_string(),
            created_at: Utc::now() - Duration::hours(hours_old),
            shares,
            remixes,
            followed,
        }
    }

    struct MockWeeklyStore {
        candidate_user: Option<Uuid>,
        battles: Vec<CandidateBattle>,
        upserts: Mutex<Vec<(Uuid, Vec<WeeklyItem>)>>,
    }

    impl MockWeeklyStore {
        fn new(battles: Vec<CandidateBattle>) -> Self {
            Self {
                candidate_user: Some(Uuid::new_v4()),
                battles,
                upserts: Mutex::new(Vec::new()),
            }
        }

        fn upserted_items(&self) -> Vec<WeeklyItem> {
            self.upserts.lock().expect("lock")[0].1.clone()
        }
    }

    #[async_trait::async_trait]
    impl WeeklyStore for MockWeeklyStore {
        async fn next_candidate(
            &self,
            _week: NaiveDate,
            _stale_before: DateTime<Utc>,
        ) -> Result<Option<Uuid>, StorageError> {
            Ok(self.candidate_user)
        }

        async fn candidate_battles(
            &self,
            _user_id: Uuid,
            _now: DateTime<Utc>,
        ) -> Result<Vec<CandidateBattle>, StorageError> {
            Ok(self.battles.clone())
        }

        async fn earliest_replies(
            &self,
            _battle_id: Uuid,
            _limit: i64,
        ) -> Result<Vec<String>, StorageError> {
            Ok(vec!["first reply".to_string()])
        }

        async fn upsert(
            &self,
            user_id: Uuid,
            _week: NaiveDate,
            items: &[WeeklyItem],
        ) -> Result<(), StorageError> {
            self.upserts
                .lock()
                .expect("lock")
                .push((user_id, items.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn scoring_matches_formula() {
        let now = Utc::now();
        let battle = candidate(10, 2, 1, true);
        // 6 + 2*2 + 1*3 + (96 - 10) = 99
        assert!((score_battle(&battle, now) - 99.0).abs() < 1.0);
    }

    #[test]
    fn old_battles_lose_freshness_entirely() {
        let now = Utc::now();
        let battle = candidate(200, 0, 0, false);
        assert!((score_battle(&battle, now) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn topic_prefers_topic_line() {
        let topic = extract_topic("Topic: Are cats better debaters?\nBody follows.");
        assert_eq!(topic, "Are cats better debaters?");
    }

    #[test]
    fn topic_falls_back_to_first_sentence() {
        let topic = extract_topic("Dogs rule. Cats drool. More text here.");
        assert_eq!(topic, "Dogs rule.");
    }

    #[test]
    fn topic_is_capped() {
        let long = "word ".repeat(100);
        assert!(extract_topic(&long).chars().count() <= 140);
    }

    #[test]
    fn fallback_summary_variants() {
        assert_eq!(
            fallback_summary("X", 2, 3),
            "X gained traction this week with 2 shares and 3 remixes."
        );
        assert_eq!(
            fallback_summary("X", 2, 0),
            "X gained traction this week with 2 shares."
        );
        assert_eq!(
            fallback_summary("X", 0, 0),
            "X sparked a fresh discussion this week."
        );
    }

    #[tokio::test]
    async fn pass_takes_top_three_by_score() {
        let battles = vec![
            candidate(1, 0, 0, false),  // 95
            candidate(1, 10, 0, false), // 115
            candidate(1, 0, 10, false), // 125
            candidate(90, 0, 0, false), // 6
            candidate(1, 0, 0, true),   // 101
        ];
        let expected_top: Vec<Uuid> =
            vec![battles[2].battle_id, battles[1].battle_id, battles[4].battle_id];

        let store = MockWeeklyStore::new(battles);
        let llm: Arc<dyn LlmProvider> = Arc::new(MockProvider::new());
        run_pass(&store, &llm).await.expect("pass");

        let items = store.upserted_items();
        assert_eq!(items.len(), 3);
        let got: Vec<Uuid> = items.iter().map(|i| i.battle_id).collect();
        assert_eq!(got, expected_top);
    }

    #[tokio::test]
    async fn llm_failure_uses_fallback_summary() {
        let store = MockWeeklyStore::new(vec![candidate(1, 2, 0, false)]);
        let llm: Arc<dyn LlmProvider> = Arc::new(MockProvider::with_failures(10));
        run_pass(&store, &llm).await.expect("pass");

        let items = store.upserted_items();
        assert_eq!(
            items[0].summary,
            "Are cats better debaters? gained traction this week with 2 shares."
        );
    }

    #[tokio::test]
    async fn empty_candidates_upsert_empty_digest() {
        let store = MockWeeklyStore::new(Vec::new());
        let llm: Arc<dyn LlmProvider> = Arc::new(MockProvider::new());
        run_pass(&store, &llm).await.expect("pass");
        assert!(store.upserted_items().is_empty());
    }
}
