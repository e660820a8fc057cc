//! UTC day and ISO-week boundary helpers.
//!
//! Quota counting, daily digests, and weekly digests all share these
//! boundaries; they are UTC by contract.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

/// Midnight UTC of the instant's calendar day.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(
        &now.date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid"),
    )
}

/// The instant's calendar date in UTC.
pub fn today(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

/// Midnight UTC of the Monday of the instant's ISO week.
pub fn week_start(now: DateTime<Utc>) -> NaiveDate {
    let date = now.date_naive();
    let days_from_monday = i64::from(date.weekday().num_days_from_monday());
    date - Duration::days(days_from_monday)
}

/// Whole hours elapsed since `then`, clamped at zero for future instants.
pub fn age_hours(now: DateTime<Utc>, then: DateTime<Utc>) -> i64 {
    now.signed_duration_since(then).num_hours().max(0)
}
