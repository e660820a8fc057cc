//! The personalized feed composer.
//!
//! Pulls three sources (followed battles, trending battles, new public
//! templates), merges them by stable key, scores, deduplicates, and
//! returns a ranked list plus a highlight template. Pure logic; the
//! source queries live in `storage::feed` and `storage::templates`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::storage::feed::FeedBattle;
use crate::storage::templates::TemplateWithUsage;
use crate::timeutil::age_hours;

/// Maximum number of items in a composed feed.
const FEED_CAP: usize = 50;

/// Feed inclusion reasons, in display order.
pub const REASON_FOLLOWED: &str = "followed_persona";
pub const REASON_TRENDING: &str = "trending_battle";
pub const REASON_NEW_TEMPLATE: &str = "new_template";

// Ranking constants. Chosen empirically; not part of the API contract.
const FOLLOWED_BASE: f64 = 95.0;
const TRENDING_BASE: f64 = 70.0;
const TEMPLATE_BASE: f64 = 60.0;

/// One entry of the composed feed.
#[derive(Debug, Clone, Serialize)]
pub struct FeedItem {
    /// Stable dedup key: `battle:<id>` or `template:<id>`.
    pub key: String,
    /// "battle" or "template".
    pub kind: String,
    pub id: Uuid,
    /// Room name for battles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
    /// Content preview for battles, template name for templates.
    pub preview: String,
    /// Sorted, non-empty inclusion reasons.
    pub reasons: Vec<String>,
    pub score: f64,
    pub shares: i64,
    pub remixes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_count: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// The template highlighted above the feed.
#[derive(Debug, Clone, Serialize)]
pub struct HighlightTemplate {
    pub id: Uuid,
    pub name: String,
    pub usage_count: i64,
    pub is_trending: bool,
}

/// A fully composed feed.
#[derive(Debug, Clone, Serialize)]
pub struct ComposedFeed {
    pub items: Vec<FeedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_template: Option<HighlightTemplate>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn followed_score(battle: &FeedBattle, now: DateTime<Utc>) -> f64 {
    let age = age_hours(now, battle.created_at) as f64;
    round2(
        FOLLOWED_BASE + battle.shares as f64 * 2.0 + battle.remixes as f64 * 4.0 - age * 0.35,
    )
}

fn trending_score(battle: &FeedBattle, now: DateTime<Utc>) -> f64 {
    let age = age_hours(now, battle.created_at) as f64;
    round2(
        TRENDING_BASE + battle.shares as f64 * 3.0 + battle.remixes as f64 * 5.0 - age * 0.25,
    )
}

fn template_score(template: &TemplateWithUsage, now: DateTime<Utc>) -> f64 {
    let age = age_hours(now, template.created_at) as f64;
    round2(TEMPLATE_BASE + template.usage_count as f64 * 2.0 - age * 0.12)
}

/// Display rank of a reason; unknown reasons sort last, alphabetically.
fn reason_rank(reason: &str) -> (u8, &str) {
    match reason {
        REASON_FOLLOWED => (0, reason),
        REASON_TRENDING => (1, reason),
        REASON_NEW_TEMPLATE => (2, reason),
        other => (3, other),
    }
}

fn merge_battle(items: &mut Vec<FeedItem>, battle: &FeedBattle, reason: &str, score: f64) {
    let key = format!("battle:{}", battle.post_id);
    if let Some(existing) = items.iter_mut().find(|item| item.key == key) {
        if !existing.reasons.iter().any(|r| r == reason) {
            existing.reasons.push(reason.to_string());
        }
        existing.score = existing.score.max(score);
        existing.shares = existing.shares.max(battle.shares);
        existing.remixes = existing.remixes.max(battle.remixes);
    } else {
        items.push(FeedItem {
            key,
            kind: "battle".to_string(),
            id: battle.post_id,
            room_name: Some(battle.room_name.clone()),
            preview: battle.content_preview.clone(),
            reasons: vec![reason.to_string()],
            score,
            shares: battle.shares,
            remixes: battle.remixes,
            usage_count: None,
            created_at: battle.created_at,
        });
    }
}

/// Merge the three sources into a ranked, deduplicated feed.
pub fn compose(
    followed: &[FeedBattle],
    trending: &[FeedBattle],
    templates: &[TemplateWithUsage],
    now: DateTime<Utc>,
) -> ComposedFeed {
    let mut items: Vec<FeedItem> = Vec::new();

    for battle in followed {
        merge_battle(&mut items, battle, REASON_FOLLOWED, followed_score(battle, now));
    }
    for battle in trending {
        merge_battle(&mut items, battle, REASON_TRENDING, trending_score(battle, now));
    }
    for template in templates {
        items.push(FeedItem {
            key: format!("template:{}", template.id),
            kind: "template".to_string(),
            id: template.id,
            room_name: None,
            preview: template.name.clone(),
            reasons: vec![REASON_NEW_TEMPLATE.to_string()],
            score: template_score(template, now),
            shares: 0,
            remixes: 0,
            usage_count: Some(template.usage_count),
            created_at: template.created_at,
        });
    }

    for item in &mut items {
        item.reasons.sort_by(|a, b| reason_rank(a).cmp(&reason_rank(b)));
    }

    items.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.created_at.cmp(&a.created_at))
    });
    items.truncate(FEED_CAP);

    let highlight_template = templates
        .iter()
        .max_by(|a, b| {
            a.usage_count
                .cmp(&b.usage_count)
                .then(a.created_at.cmp(&b.created_at))
        })
        .map(|template| HighlightTemplate {
            id: template.id,
            name: template.name.clone(),
            usage_count: template.usage_count,
            is_trending: true,
        });

    ComposedFeed {
        items,
        highlight_template,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap()
    }

    fn battle(id: Uuid, hours_old: i64, shares: i64, remixes: i64) -> FeedBattle {
        FeedBattle {
            post_id: id,
            room_id: Uuid::new_v4(),
            room_name: "Genel".to_string(),
            persona_id: Some(Uuid::new_v4()),
            content_preview: "a heated exchange".to_string(),
            created_at: now() - Duration::hours(hours_old),
            shares,
            remixes,
        }
    }

    fn template(id: Uuid, hours_old: i64, usage: i64) -> TemplateWithUsage {
        TemplateWithUsage {
            id,
            name: "Klasik Düello".to_string(),
            turn_count: 6,
            word_limit: 120,
            created_at: now() - Duration::hours(hours_old),
            usage_count: usage,
        }
    }

    #[test]
    fn battle_in_both_sources_merges() {
        let id = Uuid::new_v4();
        let followed = vec![battle(id, 2, 2, 0)];
        let trending = vec![battle(id, 2, 2, 0)];
        let feed = compose(&followed, &trending, &[], now());

        assert_eq!(feed.items.len(), 1);
        let item = &feed.items[0];
        assert_eq!(
            item.reasons,
            vec![REASON_FOLLOWED.to_string(), REASON_TRENDING.to_string()]
        );
        // followed: 95 + 4 - 0.7 = 98.3; trending: 70 + 6 - 0.5 = 75.5
        assert!((item.score - 98.3).abs() < f64::EPSILON);
        assert_eq!(item.shares, 2);
    }

    #[test]
    fn scores_round_to_two_decimals() {
        let followed = vec![battle(Uuid::new_v4(), 1, 0, 0)];
        let feed = compose(&followed, &[], &[], now());
        // 95 - 0.35 = 94.65
        assert!((feed.items[0].score - 94.65).abs() < f64::EPSILON);
    }

    #[test]
    fn sorted_by_score_then_recency() {
        let hot = battle(Uuid::new_v4(), 1, 5, 5);
        let cold = battle(Uuid::new_v4(), 90, 0, 0);
        let feed = compose(&[cold.clone(), hot.clone()], &[], &[], now());
        assert_eq!(feed.items[0].id, hot.post_id);
        assert_eq!(feed.items[1].id, cold.post_id);
    }

    #[test]
    fn caps_at_fifty_items() {
        let followed: Vec<FeedBattle> =
            (0..60).map(|i| battle(Uuid::new_v4(), i, 0, 0)).collect();
        let feed = compose(&followed, &[], &[], now());
        assert_eq!(feed.items.len(), 50);
    }

    #[test]
    fn items_unique_by_key() {
        let id = Uuid::new_v4();
        let followed = vec![battle(id, 1, 1, 0)];
        let trending = vec![battle(id, 1, 3, 1)];
        let feed = compose(&followed, &trending, &[], now());
        let keys: Vec<&str> = feed.items.iter().map(|i| i.key.as_str()).collect();
        let mut deduped = keys.clone();
        deduped.dedup();
        assert_eq!(keys, deduped);
        // max engagement across sources is retained
        assert_eq!(feed.items[0].shares, 3);
        assert_eq!(feed.items[0].remixes, 1);
    }

    #[test]
    fn highlight_is_most_used_template() {
        let quiet = template(Uuid::new_v4(), 5, 1);
        let popular = template(Uuid::new_v4(), 10, 7);
        let feed = compose(&[], &[], &[quiet, popular.clone()], now());

        let highlight = feed.highlight_template.expect("highlight");
        assert_eq!(highlight.id, popular.id);
        assert!(highlight.is_trending);
    }

    #[test]
    fn highlight_tie_breaks_by_newest() {
        let older = template(Uuid::new_v4(), 10, 3);
        let newer = template(Uuid::new_v4(), 1, 3);
        let feed = compose(&[], &[], &[older, newer.clone()], now());
        assert_eq!(feed.highlight_template.expect("highlight").id, newer.id);
    }

    #[test]
    fn template_scoring() {
        let t = template(Uuid::new_v4(), 10, 1);
        let feed = compose(&[], &[], &[t], now());
        // 60 + 2 - 1.2 = 60.8
        assert!((feed.items[0].score - 60.8).abs() < f64::EPSILON);
        assert_eq!(feed.items[0].usage_count, Some(1));
    }

    #[test]
    fn empty_sources_compose_empty() {
        let feed = compose(&[], &[], &[], now());
        assert!(feed.items.is_empty());
        assert!(feed.highlight_template.is_none());
    }

    #[test]
    fn reasons_never_empty() {
        let followed = vec![battle(Uuid::new_v4(), 1, 0, 0)];
        let templates = vec![template(Uuid::new_v4(), 1, 0)];
        let feed = compose(&followed, &[], &templates, now());
        assert!(feed.items.iter().all(|item| !item.reasons.is_empty()));
    }
}
