//! Shared application state for the API server.

use std::sync::Arc;

use personaworlds_core::config::Config;
use personaworlds_core::llm::LlmProvider;
use personaworlds_core::metrics::{Counter, Registry};
use personaworlds_core::ratelimit::FixedWindowLimiter;
use personaworlds_core::storage::DbPool;

/// Shared application state accessible by all route handlers.
pub struct AppState {
    /// Postgres connection pool.
    pub db: DbPool,
    /// Validated configuration.
    pub config: Config,
    /// The configured LLM provider.
    pub llm: Arc<dyn LlmProvider>,
    /// IP limiter for public read endpoints (120/min).
    pub public_read_limiter: FixedWindowLimiter,
    /// IP limiter for public write endpoints (30/min).
    pub public_write_limiter: FixedWindowLimiter,
    /// Per-user limiter for battle/template creation.
    pub creation_limiter: FixedWindowLimiter,
    /// Prometheus-style metrics registry.
    pub metrics: Registry,
    /// Total HTTP requests served.
    pub requests_total: Arc<Counter>,
    /// Total HTTP responses with an error status.
    pub errors_total: Arc<Counter>,
}

impl AppState {
    /// Assemble state from configuration and the shared pool/provider.
    pub fn new(db: DbPool, config: Config, llm: Arc<dyn LlmProvider>) -> Self {
        let mut metrics = Registry::new();
        let requests_total = metrics.counter("http_requests_total", "Total HTTP requests.");
        let errors_total =
            metrics.counter("http_errors_total", "Total HTTP error responses.");

        Self {
            db,
            config,
            llm,
            public_read_limiter: FixedWindowLimiter::public_read(),
            public_write_limiter: FixedWindowLimiter::public_write(),
            creation_limiter: FixedWindowLimiter::new(10, std::time::Duration::from_secs(60)),
            metrics,
            requests_total,
            errors_total,
        }
    }
}
