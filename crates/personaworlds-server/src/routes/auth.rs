//! Signup and login.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use personaworlds_core::auth::{create_session, hash_password, verify_password};
use personaworlds_core::storage::users;

use crate::auth::client_ip;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for signup and login.
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

fn check_write_limit(
    state: &AppState,
    headers: &HeaderMap,
    addr: SocketAddr,
) -> Result<(), ApiError> {
    let ip = client_ip(headers, addr);
    if !state.public_write_limiter.allow(&ip) {
        return Err(ApiError::rate_limited("too many requests"));
    }
    Ok(())
}

/// `POST /auth/signup` — create a user and return a bearer token.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    check_write_limit(&state, &headers, addr)?;

    let email = body.email.trim().to_lowercase();
    if !email.contains('@') || email.len() < 3 {
        return Err(ApiError::validation("invalid email address"));
    }
    if body.password.len() < 8 {
        return Err(ApiError::validation("password must be at least 8 characters"));
    }

    let password_hash = hash_password(&body.password)?;
    let user = match users::create(&state.db, &email, &password_hash).await {
        Ok(user) => user,
        Err(e) if e.is_unique_violation(None) => {
            return Err(ApiError::conflict("email already registered"));
        }
        Err(e) => return Err(e.into()),
    };

    let session = create_session(&state.db, user.id).await?;
    tracing::info!(user_id = %user.id, "User signed up");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "token": session.raw_token,
            "user_id": user.id,
            "expires_at": session.expires_at,
        })),
    ))
}

/// `POST /auth/login` — verify credentials and return a bearer token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<Value>, ApiError> {
    check_write_limit(&state, &headers, addr)?;

    let user = users::find_by_email(&state.db, body.email.trim())
        .await?
        .ok_or_else(|| ApiError::unauthorized("invalid credentials"))?;

    if !verify_password(&body.password, &user.password_hash)? {
        return Err(ApiError::unauthorized("invalid credentials"));
    }

    let session = create_session(&state.db, user.id).await?;
    Ok(Json(json!({
        "token": session.raw_token,
        "user_id": user.id,
        "expires_at": session.expires_at,
    })))
}
