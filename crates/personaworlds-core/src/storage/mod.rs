//! Postgres storage layer.
//!
//! Provides database initialization, connection pooling, and query
//! functions for all persistent entities. All cross-row invariants are
//! expressed as SQL constraints and unique indexes; multi-statement
//! invariants run inside short transactions.

pub mod activity;
pub mod digests;
pub mod events;
pub mod feed;
pub mod follows;
pub mod jobs;
pub mod notifications;
pub mod personas;
pub mod posts;
pub mod profiles;
pub mod quota;
pub mod replies;
pub mod rooms;
pub mod templates;
pub mod users;
pub mod weekly;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use crate::error::StorageError;

/// Type alias for the Postgres connection pool.
pub type DbPool = sqlx::PgPool;

/// Connect to Postgres and run embedded migrations.
pub async fn init_db(database_url: &str) -> Result<DbPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .connect(database_url)
        .await
        .map_err(|e| StorageError::Connection { source: e })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| StorageError::Migration { source: e })?;

    Ok(pool)
}

/// Liveness probe: round-trip a trivial query.
pub async fn ping(pool: &DbPool) -> Result<(), StorageError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;
    Ok(())
}

/// Number of applied migrations (readiness probe).
pub async fn migrations_applied(pool: &DbPool) -> Result<i64, StorageError> {
    let row: (i64,) = sqlx::query_as("SELECT count(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .map_err(|e| StorageError::Query { source: e })?;
    Ok(row.0)
}

pub(crate) fn query_err(source: sqlx::Error) -> StorageError {
    StorageError::Query { source }
}
