//! Persona Worlds background worker binary.
//!
//! Runs the polling loop (one digest refresh, one weekly refresh, one
//! job per tick) plus a small observability listener serving /healthz
//! and /metrics.

use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;
use tracing_subscriber::EnvFilter;

use personaworlds_core::config::Config;
use personaworlds_core::llm::factory::create_provider;
use personaworlds_core::storage::{self, jobs, DbPool};
use personaworlds_core::worker::{Runtime, WorkerLoop};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        poll_secs = config.worker_poll_every.as_secs(),
        provider = ?config.llm.provider,
        "starting personaworlds worker"
    );

    let pool = storage::init_db(&config.database_url).await?;
    let llm = create_provider(&config.llm);

    let mut runtime = Runtime::new();
    let cancel = runtime.cancel_token();

    let worker = WorkerLoop::new(
        pool.clone(),
        llm,
        config.limits,
        config.worker_poll_every,
    );
    runtime.spawn("worker-loop", async move {
        worker.run(cancel).await;
    });

    let observability_addr =
        SocketAddr::from(([0, 0, 0, 0], config.worker_observability_port));
    let observability_cancel = runtime.cancel_token();
    let observability_pool = pool.clone();
    runtime.spawn("observability", async move {
        if let Err(e) =
            serve_observability(observability_addr, observability_pool, observability_cancel).await
        {
            tracing::error!(error = %e, "Observability listener failed");
        }
    });

    runtime.run_until_shutdown().await;
    Ok(())
}

/// Serve /healthz and /metrics until cancellation.
async fn serve_observability(
    addr: SocketAddr,
    pool: DbPool,
    cancel: tokio_util::sync::CancellationToken,
) -> Result<()> {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(pool);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "observability listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

async fn healthz(State(pool): State<DbPool>) -> Json<serde_json::Value> {
    let db_ok = storage::ping(&pool).await.is_ok();
    Json(serde_json::json!({ "status": if db_ok { "ok" } else { "degraded" } }))
}

/// Job-queue gauges in Prometheus text exposition format.
async fn metrics(State(pool): State<DbPool>) -> String {
    let mut out = String::from(
        "# HELP personaworlds_jobs Job counts by status.\n# TYPE personaworlds_jobs gauge\n",
    );
    match jobs::counts_by_status(&pool).await {
        Ok(counts) => {
            for (status, count) in counts {
                out.push_str(&format!(
                    "personaworlds_jobs{{status=\"{status}\"}} {count}\n"
                ));
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to query job counts");
        }
    }
    out
}
