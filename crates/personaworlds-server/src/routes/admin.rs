//! Admin analytics summary.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Map, Value};

use personaworlds_core::storage::{events, posts, replies, users};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /admin/analytics/summary` — counts over the last 24 hours and
/// the last 7 days.
pub async fn summary(
    State(state): State<Arc<AppState>>,
    AuthUser(_user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let now = chrono::Utc::now();
    let day_ago = now - chrono::Duration::hours(24);
    let week_ago = now - chrono::Duration::days(7);

    let mut out = Map::new();
    for (label, since) in [("last_24h", day_ago), ("last_7d", week_ago)] {
        let signups = users::count_since(&state.db, since).await?;
        let battles_published = posts::count_published_since(&state.db, since).await?;
        let replies_generated = replies::count_since(&state.db, since).await?;

        let mut by_name = Map::new();
        for (name, count) in events::counts_by_name_since(&state.db, since).await? {
            by_name.insert(name, json!(count));
        }

        out.insert(
            label.to_string(),
            json!({
                "signups": signups,
                "battles_published": battles_published,
                "replies_generated": replies_generated,
                "events": by_name,
            }),
        );
    }

    Ok(Json(Value::Object(out)))
}
