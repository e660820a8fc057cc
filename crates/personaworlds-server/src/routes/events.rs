//! Analytics event ingestion.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use personaworlds_core::safety::sanitize::sanitize_metadata;
use personaworlds_core::storage::notifications::{self, NotificationKind};
use personaworlds_core::storage::{events, posts};

use crate::auth::{client_ip, MaybeUser};
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for event ingestion.
#[derive(Deserialize)]
pub struct EventRequest {
    pub event_name: String,
    #[serde(default)]
    pub metadata: Value,
}

/// `POST /events` — append a product event. Metadata is sanitized
/// before persistence; a completed remix notifies the battle owner.
pub async fn append(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    MaybeUser(user): MaybeUser,
    Json(body): Json<EventRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if !state.public_write_limiter.allow(&client_ip(&headers, addr)) {
        return Err(ApiError::rate_limited("too many requests"));
    }

    let event_name = body.event_name.trim().to_string();
    if event_name.is_empty() || event_name.chars().count() > 64 {
        return Err(ApiError::validation("event_name must be 1-64 characters"));
    }

    let metadata = sanitize_metadata(&body.metadata);
    events::append(&state.db, user, &event_name, &metadata).await?;

    if event_name == "remix_completed" {
        if let Some(battle_id) = metadata
            .get("battle_id")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse::<Uuid>().ok())
        {
            notify_battle_owner(&state, user, battle_id).await?;
        }
    }

    Ok((StatusCode::CREATED, Json(json!({ "recorded": event_name }))))
}

async fn notify_battle_owner(
    state: &AppState,
    actor: Option<Uuid>,
    battle_id: Uuid,
) -> Result<(), ApiError> {
    let Some(post) = posts::get(&state.db, battle_id).await? else {
        return Ok(());
    };
    if actor == Some(post.user_id) {
        return Ok(());
    }
    notifications::create(
        &state.db,
        post.user_id,
        actor,
        NotificationKind::BattleRemixed,
        "Your battle was remixed",
        "Someone completed a remix of your battle.",
        &json!({ "battle_id": battle_id.to_string() }),
    )
    .await?;
    Ok(())
}
