//! Domain workflows: admission checks, the post lifecycle, reply-job
//! enqueueing, thread views, and battle creation.
//!
//! Each workflow loads what it needs, enforces ownership and state
//! preconditions, and wraps multi-statement invariants in one
//! transaction. Errors use the shared [`crate::error::DomainError`]
//! taxonomy.

pub mod approve;
pub mod battles;
pub mod draft;
pub mod replies;
pub mod thread;

use uuid::Uuid;

use crate::error::{DomainError, StorageError};
use crate::storage::personas::{self, Persona};
use crate::storage::DbPool;

/// Wrap a raw transaction-control error into the domain taxonomy.
pub(crate) fn db_err(source: sqlx::Error) -> DomainError {
    DomainError::from(StorageError::Query { source })
}

/// Load a persona and require it to be owned by `user_id`.
pub(crate) async fn load_owned_persona(
    pool: &DbPool,
    user_id: Uuid,
    persona_id: Uuid,
) -> Result<Persona, DomainError> {
    let persona = personas::get(pool, persona_id)
        .await?
        .ok_or_else(|| DomainError::NotFound("persona not found".to_string()))?;
    if persona.user_id != user_id {
        return Err(DomainError::Forbidden("persona belongs to another user".to_string()));
    }
    Ok(persona)
}
