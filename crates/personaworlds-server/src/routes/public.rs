//! Public surface: persona profiles, battle views, remix intents.
//!
//! These endpoints serve anonymous traffic and are IP-limited; the
//! follow endpoint is the one place an unauthenticated caller gets the
//! distinguished `signup_required` response instead of a plain 401.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Redirect;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use personaworlds_core::auth::remix;
use personaworlds_core::safety::{sanitize::sanitize_metadata, truncate_preview};
use personaworlds_core::storage::notifications::{self, NotificationKind};
use personaworlds_core::storage::{events, follows, personas, posts, profiles, replies};
use personaworlds_core::worker::weekly_pass::extract_topic;
use personaworlds_core::workflow;

use crate::auth::{client_ip, MaybeUser};
use crate::error::ApiError;
use crate::state::AppState;

fn check_read_limit(
    state: &AppState,
    headers: &HeaderMap,
    addr: SocketAddr,
) -> Result<(), ApiError> {
    if !state.public_read_limiter.allow(&client_ip(headers, addr)) {
        return Err(ApiError::rate_limited("too many requests"));
    }
    Ok(())
}

fn check_write_limit(
    state: &AppState,
    headers: &HeaderMap,
    addr: SocketAddr,
) -> Result<(), ApiError> {
    if !state.public_write_limiter.allow(&client_ip(headers, addr)) {
        return Err(ApiError::rate_limited("too many requests"));
    }
    Ok(())
}

/// `GET /p/{slug}` — public persona profile.
pub async fn profile(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Json<Value>, ApiError> {
    check_read_limit(&state, &headers, addr)?;

    let profile = profiles::get_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::not_found("profile not found"))?;
    let persona = personas::get(&state.db, profile.persona_id)
        .await?
        .ok_or_else(|| ApiError::not_found("profile not found"))?;
    let followers = follows::follower_count(&state.db, persona.id).await?;

    Ok(Json(json!({
        "slug": profile.slug,
        "name": persona.name,
        "bio": profile.bio,
        "tone": persona.tone,
        "followers": followers,
        "created_at": profile.created_at,
    })))
}

/// `GET /p/{slug}/posts` — published posts by the persona.
pub async fn profile_posts(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Json<Value>, ApiError> {
    check_read_limit(&state, &headers, addr)?;

    let profile = profiles::get_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::not_found("profile not found"))?;
    let posts = posts::list_published_for_persona(&state.db, profile.persona_id, 50).await?;

    let body: Vec<Value> = posts
        .iter()
        .map(|post| {
            json!({
                "id": post.id,
                "room_id": post.room_id,
                "content": post.content,
                "published_at": post.published_at,
            })
        })
        .collect();
    Ok(Json(json!({ "posts": body })))
}

/// `POST /p/{slug}/follow` — follow the persona. Anonymous callers get
/// `401 {"error":"signup_required"}`.
pub async fn follow(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Some(user_id) = user else {
        return Err(ApiError::unauthorized("signup_required"));
    };

    let profile = profiles::get_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::not_found("profile not found"))?;
    let persona = personas::get(&state.db, profile.persona_id)
        .await?
        .ok_or_else(|| ApiError::not_found("profile not found"))?;

    if persona.user_id == user_id {
        return Err(ApiError::conflict("cannot follow your own persona"));
    }

    match follows::create(&state.db, user_id, persona.id).await {
        Ok(()) => {}
        Err(e) if e.is_unique_violation(None) => {
            return Err(ApiError::conflict("already following"));
        }
        Err(e) => return Err(e.into()),
    }

    notifications::create(
        &state.db,
        persona.user_id,
        Some(user_id),
        NotificationKind::PersonaFollowed,
        &format!("{} has a new follower", persona.name),
        "Your persona gained a follower.",
        &json!({ "persona_id": persona.id.to_string() }),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(json!({ "following": persona.id }))))
}

async fn load_published_battle(
    state: &AppState,
    battle_id: Uuid,
) -> Result<posts::Post, ApiError> {
    let post = posts::get(&state.db, battle_id)
        .await?
        .ok_or_else(|| ApiError::not_found("battle not found"))?;
    if !post.is_published() {
        return Err(ApiError::not_found("battle not found"));
    }
    Ok(post)
}

/// `GET /b/{id}` — public battle view. An authenticated view lands a
/// `public_battle_viewed` event, which feeds the weekly digest's seen
/// exclusion.
pub async fn battle(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    MaybeUser(user): MaybeUser,
    Path(battle_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    check_read_limit(&state, &headers, addr)?;

    let post = load_published_battle(&state, battle_id).await?;
    let reply_rows = replies::list_for_post(&state.db, post.id).await?;

    if let Some(user_id) = user {
        events::append(
            &state.db,
            Some(user_id),
            "public_battle_viewed",
            &json!({ "battle_id": post.id.to_string() }),
        )
        .await?;
    }

    let reply_body: Vec<Value> = reply_rows
        .iter()
        .map(|reply| {
            json!({
                "id": reply.id,
                "persona_id": reply.persona_id,
                "content": reply.content,
                "created_at": reply.created_at,
            })
        })
        .collect();

    Ok(Json(json!({
        "id": post.id,
        "room_id": post.room_id,
        "content": post.content,
        "template_id": post.template_id,
        "published_at": post.published_at,
        "replies": reply_body,
    })))
}

/// `GET /b/{id}/meta` — lightweight metadata for link unfurling.
pub async fn battle_meta(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(battle_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    check_read_limit(&state, &headers, addr)?;

    let post = load_published_battle(&state, battle_id).await?;
    let reply_rows = replies::list_for_post(&state.db, post.id).await?;

    Ok(Json(json!({
        "id": post.id,
        "topic": extract_topic(&post.content),
        "preview": truncate_preview(&post.content, 220),
        "reply_count": reply_rows.len(),
        "published_at": post.published_at,
    })))
}

/// `GET /b/{id}/card.png` — the share card is rendered by the frontend;
/// redirect there.
pub async fn battle_card(
    State(state): State<Arc<AppState>>,
    Path(battle_id): Path<Uuid>,
) -> Result<Redirect, ApiError> {
    load_published_battle(&state, battle_id).await?;
    Ok(Redirect::temporary(&format!(
        "{}/b/{battle_id}/card",
        state.config.frontend_origin
    )))
}

/// `GET /b/{id}/summary` — public LLM summary of the battle thread.
pub async fn battle_summary(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(battle_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    check_read_limit(&state, &headers, addr)?;

    let summary = workflow::thread::public_summary(
        &state.db,
        &state.llm,
        &state.config.limits,
        battle_id,
    )
    .await?;
    Ok(Json(json!({ "id": battle_id, "summary": summary })))
}

/// `POST /battles/{id}/remix-intent` — a signed, short-lived token
/// authorizing a remix of this battle.
pub async fn remix_intent(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    MaybeUser(user): MaybeUser,
    Path(battle_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    check_write_limit(&state, &headers, addr)?;

    let post = load_published_battle(&state, battle_id).await?;
    let (token, expires_at) = remix::issue(&state.config.jwt_secret, post.id, chrono::Utc::now());

    events::append(
        &state.db,
        user,
        "remix_started",
        &sanitize_metadata(&json!({ "battle_id": post.id.to_string() })),
    )
    .await?;

    Ok(Json(json!({ "token": token, "expires_at": expires_at })))
}
