//! Authentication primitives.
//!
//! Passwords are bcrypt-hashed; API access uses opaque bearer tokens
//! stored as SHA-256 hashes in the `sessions` table, so a database
//! compromise does not leak usable tokens. Remix intents are signed,
//! short-lived, and stateless.

pub mod password;
pub mod remix;
pub mod session;

pub use password::{hash_password, verify_password};
pub use session::{create_session, validate_session, NewSession};
