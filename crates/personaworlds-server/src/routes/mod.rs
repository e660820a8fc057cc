//! Route modules and router assembly for the API server.

pub mod admin;
pub mod auth;
pub mod digest;
pub mod events;
pub mod feed;
pub mod health;
pub mod notifications;
pub mod personas;
pub mod posts;
pub mod public;
pub mod rooms;
pub mod templates;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .frontend_origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:3000")),
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([axum::http::header::AUTHORIZATION, axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/rooms", get(rooms::list))
        .route("/rooms/{id}/posts", get(rooms::list_posts))
        .route("/rooms/{id}/posts/draft", post(rooms::create_draft))
        .route("/rooms/{id}/battles", post(rooms::create_battle))
        .route("/posts/{id}/approve", post(posts::approve))
        .route("/posts/{id}/generate-replies", post(posts::generate_replies))
        .route("/posts/{id}/thread", get(posts::thread))
        .route("/feed", get(feed::feed))
        .route("/notifications", get(notifications::list))
        .route("/notifications/read-all", post(notifications::read_all))
        .route("/notifications/{id}/read", post(notifications::read_one))
        .route("/digest/weekly", get(digest::weekly))
        .route(
            "/personas",
            get(personas::list).post(personas::create),
        )
        .route(
            "/personas/{id}",
            get(personas::get_one)
                .put(personas::update)
                .delete(personas::delete_one),
        )
        .route("/personas/{id}/preview", post(personas::preview))
        .route("/personas/{id}/digest", get(personas::digest))
        .route("/personas/{id}/publish-profile", post(personas::publish_profile))
        .route("/p/{slug}", get(public::profile))
        .route("/p/{slug}/posts", get(public::profile_posts))
        .route("/p/{slug}/follow", post(public::follow))
        .route("/b/{id}", get(public::battle))
        .route("/b/{id}/meta", get(public::battle_meta))
        .route("/b/{id}/card.png", get(public::battle_card))
        .route("/b/{id}/summary", get(public::battle_summary))
        .route("/battles/{id}/remix-intent", post(public::remix_intent))
        .route("/templates", get(templates::list).post(templates::create))
        .route("/events", post(events::append))
        .route("/admin/analytics/summary", get(admin::summary))
        .layer(middleware::from_fn_with_state(state.clone(), count_requests))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Count every request and error response for `/metrics`.
async fn count_requests(
    State(state): State<Arc<AppState>>,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    state.requests_total.inc();
    let response = next.run(request).await;
    if response.status().is_client_error() || response.status().is_server_error() {
        state.errors_total.inc();
    }
    response
}
