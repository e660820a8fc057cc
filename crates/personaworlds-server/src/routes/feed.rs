//! The personalized feed endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use personaworlds_core::feed::{compose, ComposedFeed};
use personaworlds_core::storage::{feed as feed_storage, templates};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /feed` — followed battles, trending battles, and new templates,
/// merged and ranked.
pub async fn feed(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ComposedFeed>, ApiError> {
    let now = chrono::Utc::now();

    let followed = feed_storage::followed_battles(&state.db, user_id, now, 20).await?;
    let trending = feed_storage::trending_battles(&state.db, user_id, now, 20).await?;
    let template_cutoff = now - chrono::Duration::days(30);
    let templates = templates::latest_public_with_usage(&state.db, template_cutoff, 12).await?;

    Ok(Json(compose(&followed, &trending, &templates, now)))
}
