//! Router-level tests over paths that do not require a live database.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use personaworlds_core::config::{
    Config, ContentLimits, LlmConfig, LlmProviderKind, QuotaDefaults,
};
use personaworlds_core::llm::mock::MockProvider;
use personaworlds_server::routes;
use personaworlds_server::state::AppState;

fn test_state() -> Arc<AppState> {
    let config = Config {
        port: 0,
        database_url: "postgres://localhost/personaworlds_test".to_string(),
        jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
        frontend_origin: "http://localhost:3000".to_string(),
        llm: LlmConfig {
            provider: LlmProviderKind::Mock,
            openai_base_url: String::new(),
            openai_api_key: String::new(),
            openai_model: String::new(),
        },
        limits: ContentLimits {
            draft_max_len: 500,
            reply_max_len: 280,
            summary_max_len: 400,
        },
        quotas: QuotaDefaults {
            draft: 5,
            reply: 25,
            preview: 5,
        },
        worker_poll_every: Duration::from_secs(3),
        worker_observability_port: 0,
    };

    // Lazy pool: no connection is made until a query runs, and these
    // tests only hit paths that never query.
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy(&config.database_url)
        .expect("lazy pool");

    Arc::new(AppState::new(pool, config, Arc::new(MockProvider::new())))
}

#[tokio::test]
async fn healthz_is_ok() {
    let app = routes::router(test_state());
    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn metrics_render_counters() {
    let state = test_state();
    let app = routes::router(state.clone());

    let _ = app
        .clone()
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("http_requests_total"));
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = routes::router(test_state());
    let response = app
        .oneshot(Request::get("/feed").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "missing bearer token");
}

#[tokio::test]
async fn anonymous_follow_requires_signup() {
    let app = routes::router(test_state());
    let response = app
        .oneshot(
            Request::post("/p/ayse/follow")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "signup_required");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = routes::router(test_state());
    let response = app
        .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
