//! HTTP API server for the Persona Worlds backend.
//!
//! Bridges `personaworlds-core` to a JSON REST API: auth, persona CRUD,
//! the draft/approve/reply lifecycle, feed, digests, public profiles and
//! battles, templates, and analytics ingestion.

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
