//! Error types for the Persona Worlds core library.
//!
//! Each infrastructure concern has its own error enum to keep boundaries
//! clear; the domain workflows share [`DomainError`], whose variants map
//! one-to-one onto the HTTP statuses the API returns.

/// Errors related to configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is absent.
    #[error("missing required environment variable: {name}")]
    MissingVar {
        /// The name of the missing variable.
        name: String,
    },

    /// An environment variable has an unacceptable value.
    #[error("invalid value for {name}: {message}")]
    InvalidValue {
        /// The name of the invalid variable.
        name: String,
        /// A description of why the value is invalid.
        message: String,
    },
}

/// Errors from Postgres storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to connect to the database.
    #[error("database connection error: {source}")]
    Connection {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// Database migration failed.
    #[error("database migration error: {source}")]
    Migration {
        /// The underlying migration error.
        #[source]
        source: sqlx::migrate::MigrateError,
    },

    /// A database query failed.
    #[error("database query error: {source}")]
    Query {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },
}

impl StorageError {
    /// True when the underlying error is a unique-constraint violation,
    /// optionally restricted to a specific named constraint.
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        let Self::Query { source } = self else {
            return false;
        };
        let Some(db_err) = source.as_database_error() else {
            return false;
        };
        if !db_err.is_unique_violation() {
            return false;
        }
        match constraint {
            Some(name) => db_err.constraint() == Some(name),
            None => true,
        }
    }
}

/// Errors from interacting with LLM providers.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP request to the LLM endpoint failed.
    #[error("LLM HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// LLM API returned an error response.
    #[error("LLM API error (status {status}): {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The error message from the API.
        message: String,
    },

    /// LLM provider rate limit hit.
    #[error("LLM rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// LLM response could not be parsed.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// No LLM provider configured.
    #[error("no LLM provider configured")]
    NotConfigured,
}

/// Errors from authentication and session management.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Password hashing or verification failed.
    #[error("password hash error: {message}")]
    HashError {
        /// Details from the bcrypt library.
        message: String,
    },

    /// A database operation on the sessions table failed.
    #[error("session storage error: {source}")]
    Database {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },
}

/// Domain-level error taxonomy shared by all workflows.
///
/// The server maps these onto HTTP statuses: Validation → 400,
/// Unauthorized → 401, Forbidden → 403, NotFound → 404, Conflict → 409,
/// QuotaExceeded and RateLimited → 429, Upstream → 502, Internal → 500.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Malformed or out-of-range input.
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not the owner of the addressed resource.
    #[error("{0}")]
    Forbidden(String),

    /// Addressable entity absent.
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation or state-machine mis-transition.
    #[error("{0}")]
    Conflict(String),

    /// Daily quota for the persona is exhausted.
    #[error("{0}")]
    QuotaExceeded(String),

    /// IP- or user-scoped rate limit bucket is full.
    #[error("{0}")]
    RateLimited(String),

    /// LLM provider failure on a synchronous path.
    #[error("upstream generation failed: {0}")]
    Upstream(String),

    /// Database or programmer error; message is generic externally.
    #[error("internal error")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<StorageError> for DomainError {
    fn from(err: StorageError) -> Self {
        Self::Internal(Box::new(err))
    }
}

impl From<LlmError> for DomainError {
    fn from(err: LlmError) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl From<AuthError> for DomainError {
    fn from(err: AuthError) -> Self {
        Self::Internal(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_missing_var_message() {
        let err = ConfigError::MissingVar {
            name: "DATABASE_URL".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "missing required environment variable: DATABASE_URL"
        );
    }

    #[test]
    fn config_error_invalid_value_message() {
        let err = ConfigError::InvalidValue {
            name: "LLM_PROVIDER".to_string(),
            message: "must be mock or openai".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for LLM_PROVIDER: must be mock or openai"
        );
    }

    #[test]
    fn llm_error_rate_limited_message() {
        let err = LlmError::RateLimited {
            retry_after_secs: 30,
        };
        assert_eq!(err.to_string(), "LLM rate limited, retry after 30 seconds");
    }

    #[test]
    fn domain_error_internal_is_generic() {
        let err = DomainError::from(StorageError::Query {
            source: sqlx::Error::PoolClosed,
        });
        assert_eq!(err.to_string(), "internal error");
    }

    #[test]
    fn llm_error_maps_to_upstream() {
        let err = DomainError::from(LlmError::NotConfigured);
        assert!(matches!(err, DomainError::Upstream(_)));
        assert_eq!(
            err.to_string(),
            "upstream generation failed: no LLM provider configured"
        );
    }
}
