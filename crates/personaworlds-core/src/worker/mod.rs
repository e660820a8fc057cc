//! The background worker: runtime scaffolding and the polling loop.
//!
//! A worker process runs one single-threaded polling loop; multiple
//! processes may run against the same database concurrently. Each tick
//! handles at most one unit of each kind of work: one daily-digest
//! refresh, one weekly-digest refresh, one queued job. Errors in a pass
//! are logged and never abort the loop; cancellation is cooperative and
//! takes effect at pass boundaries.
//!
//! Submodules:
//! - [`reply_job`]: leases and executes `generate_reply` jobs.
//! - [`digest_pass`]: refreshes one stale persona digest per tick.
//! - [`weekly_pass`]: refreshes one stale user weekly digest per tick.

pub mod digest_pass;
pub mod reply_job;
pub mod weekly_pass;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ContentLimits;
use crate::llm::LlmProvider;
use crate::storage::DbPool;

use digest_pass::PgDigestStore;
use reply_job::PgReplyJobStore;
use weekly_pass::PgWeeklyStore;

/// The worker's polling loop.
pub struct WorkerLoop {
    pool: DbPool,
    llm: Arc<dyn LlmProvider>,
    limits: ContentLimits,
    poll_every: Duration,
}

impl WorkerLoop {
    /// Create a new worker loop over the shared pool and LLM provider.
    pub fn new(
        pool: DbPool,
        llm: Arc<dyn LlmProvider>,
        limits: ContentLimits,
        poll_every: Duration,
    ) -> Self {
        Self {
            pool,
            llm,
            limits,
            poll_every,
        }
    }

    /// Run until cancellation. One digest candidate, one weekly
    /// candidate, and one job per tick.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            poll_secs = self.poll_every.as_secs(),
            "Worker loop started"
        );

        let digest_store = PgDigestStore::new(self.pool.clone());
        let weekly_store = PgWeeklyStore::new(self.pool.clone());
        let job_store = PgReplyJobStore::new(self.pool.clone());

        loop {
            if cancel.is_cancelled() {
                break;
            }

            if let Err(e) =
                digest_pass::run_pass(&digest_store, &self.llm, &self.limits).await
            {
                tracing::warn!(error = %e, "Digest pass failed");
            }

            if let Err(e) = weekly_pass::run_pass(&weekly_store, &self.llm).await {
                tracing::warn!(error = %e, "Weekly digest pass failed");
            }

            if let Err(e) = reply_job::job_queue_pass(
                &self.pool,
                &job_store,
                &self.llm,
                &self.limits,
                &cancel,
            )
            .await
            {
                tracing::warn!(error = %e, "Job queue pass failed");
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.poll_every) => {}
            }
        }

        tracing::info!("Worker loop stopped");
    }
}

/// Runtime that manages concurrent task lifecycles.
///
/// Owns a `CancellationToken` shared by all spawned tasks and collects
/// their `JoinHandle`s for graceful shutdown.
pub struct Runtime {
    cancel: CancellationToken,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl Runtime {
    /// Create a new runtime with a fresh cancellation token.
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Return a clone of the cancellation token for passing to tasks.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn a task with a descriptive name; its handle is tracked for
    /// shutdown.
    pub fn spawn<F>(&mut self, name: impl Into<String>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        tracing::info!(task = %name, "Spawning worker task");
        let handle = tokio::spawn(future);
        self.handles.push((name, handle));
    }

    /// Cancel everything and await the handles with a 30-second timeout.
    pub async fn shutdown(&mut self) {
        tracing::info!("Initiating graceful shutdown");
        self.cancel.cancel();

        let handles: Vec<_> = self.handles.drain(..).collect();
        let shutdown = async {
            for (name, handle) in handles {
                match handle.await {
                    Ok(()) => tracing::info!(task = %name, "Task completed cleanly"),
                    Err(e) => {
                        tracing::warn!(task = %name, error = %e, "Task panicked during shutdown")
                    }
                }
            }
        };

        if tokio::time::timeout(Duration::from_secs(30), shutdown)
            .await
            .is_err()
        {
            tracing::warn!("Shutdown timeout exceeded (30s), some tasks may still be running");
        } else {
            tracing::info!("Graceful shutdown complete");
        }
    }

    /// Block until a shutdown signal arrives, then stop all tasks.
    pub async fn run_until_shutdown(mut self) {
        wait_for_shutdown_signal().await;
        self.shutdown().await;
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for an OS shutdown signal (Ctrl+C or SIGTERM).
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Failed to register SIGTERM handler, using Ctrl+C only"
                );
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                } else {
                    tracing::info!("Received Ctrl+C");
                }
                return;
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Ctrl+C handler error");
                }
                tracing::info!("Received Ctrl+C");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        } else {
            tracing::info!("Received Ctrl+C");
        }
    }
}
