//! The quota ledger.
//!
//! Append-only rows, one per chargeable action; daily usage is a count
//! over the current UTC day. Admission checks are advisory read-then-
//! insert; the small daily limits bound the race window.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::{query_err, DbPool};
use crate::error::StorageError;
use crate::timeutil::start_of_day;

/// The three chargeable action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaType {
    Draft,
    Reply,
    Preview,
}

impl QuotaType {
    /// The ledger's string form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Reply => "reply",
            Self::Preview => "preview",
        }
    }
}

/// Usage for (persona, type) since the start of the current UTC day.
pub async fn usage_today(
    pool: &DbPool,
    persona_id: Uuid,
    quota_type: QuotaType,
    now: DateTime<Utc>,
) -> Result<i64, StorageError> {
    let row: (i64,) = sqlx::query_as(
        "SELECT count(*) FROM quota_events \
         WHERE persona_id = $1 AND quota_type = $2 AND created_at >= $3",
    )
    .bind(persona_id)
    .bind(quota_type.as_str())
    .bind(start_of_day(now))
    .fetch_one(pool)
    .await
    .map_err(query_err)?;
    Ok(row.0)
}

/// Append one ledger row. Executor-generic so the reply-job transaction
/// can charge quota atomically with the reply insert.
pub async fn record<'e, E: PgExecutor<'e>>(
    executor: E,
    persona_id: Uuid,
    quota_type: QuotaType,
) -> Result<(), StorageError> {
    sqlx::query("INSERT INTO quota_events (persona_id, quota_type) VALUES ($1, $2)")
        .bind(persona_id)
        .bind(quota_type.as_str())
        .execute(executor)
        .await
        .map_err(query_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_type_strings() {
        assert_eq!(QuotaType::Draft.as_str(), "draft");
        assert_eq!(QuotaType::Reply.as_str(), "reply");
        assert_eq!(QuotaType::Preview.as_str(), "preview");
    }
}
