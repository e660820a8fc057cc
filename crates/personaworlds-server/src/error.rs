//! API error type: maps the core's domain taxonomy to HTTP responses.
//!
//! Every error body is `{"error": "<message>"}`. Internal errors are
//! logged with detail and returned with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use personaworlds_core::error::{AuthError, DomainError, StorageError};

/// API error type for route handlers.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self(DomainError::from(err))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(DomainError::from(err))
    }
}

impl ApiError {
    /// Shorthand constructors used across the routes.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self(DomainError::Validation(msg.into()))
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self(DomainError::Unauthorized(msg.into()))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(DomainError::NotFound(msg.into()))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self(DomainError::Conflict(msg.into()))
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self(DomainError::RateLimited(msg.into()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::QuotaExceeded(_) | DomainError::RateLimited(_) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            DomainError::Upstream(_) => StatusCode::BAD_GATEWAY,
            DomainError::Internal(source) => {
                tracing::error!(error = %source, "internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = axum::Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: DomainError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_statuses() {
        assert_eq!(status_of(DomainError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(DomainError::Unauthorized("x".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(DomainError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(DomainError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(DomainError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_of(DomainError::QuotaExceeded("x".into())),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(DomainError::RateLimited("x".into())),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(status_of(DomainError::Upstream("x".into())), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn internal_error_hides_detail() {
        let err = DomainError::Internal("secret detail".into());
        let response = ApiError(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
