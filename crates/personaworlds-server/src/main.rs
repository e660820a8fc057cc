//! Persona Worlds API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use personaworlds_core::config::Config;
use personaworlds_core::llm::factory::create_provider;
use personaworlds_core::storage;
use personaworlds_server::routes;
use personaworlds_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    let port = config.port;

    tracing::info!(port, provider = ?config.llm.provider, "starting personaworlds server");

    let pool = storage::init_db(&config.database_url).await?;
    let llm = create_provider(&config.llm);

    let state = Arc::new(AppState::new(pool, config, llm));
    let app = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(personaworlds_core::worker::wait_for_shutdown_signal())
    .await?;

    Ok(())
}
