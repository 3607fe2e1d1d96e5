//! Error → HTTP response mapping.
//!
//! Every failure leaves the API as `{"error": <code>, "message": <text>}`;
//! validation failures add `"errors": [...]` with one entry per field problem.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use rigstock_auth::{AuthzError, LoginError};
use rigstock_core::DomainError;
use rigstock_infra::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    InvalidId(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Uniform 401; the reason is only logged.
    pub fn unauthorized() -> Self {
        Self::Unauthorized("invalid or expired token".into())
    }

    pub fn invalid_id(what: &str) -> Self {
        Self::InvalidId(format!("invalid {what} id"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Forbidden(_) => Self::Forbidden("administrator role required".into()),
        }
    }
}

impl From<LoginError<StoreError>> for ApiError {
    fn from(err: LoginError<StoreError>) -> Self {
        match err {
            LoginError::AccountLocked => Self::RateLimited(err.to_string()),
            LoginError::InvalidCredentials => Self::Unauthorized(err.to_string()),
            LoginError::InactiveAccount => Self::Forbidden(err.to_string()),
            LoginError::Token(e) => Self::Internal(e.to_string()),
            LoginError::Lookup(e) => Self::Store(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Store(StoreError::Duplicate(msg)) => {
                json_error(StatusCode::BAD_REQUEST, "conflict", msg)
            }
            ApiError::Store(err) => {
                error!(error = %err, "store failure");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", err.to_string())
            }
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
            ApiError::Unauthorized(msg) => json_error(StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::RateLimited(msg) => {
                json_error(StatusCode::TOO_MANY_REQUESTS, "account_locked", msg)
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "internal error");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(errors) => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "error": "validation_error",
                "message": errors.join("; "),
                "errors": errors,
            })),
        )
            .into_response(),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invariant_violation", msg)
        }
        DomainError::Conflict(msg) => json_error(StatusCode::BAD_REQUEST, "conflict", msg),
        DomainError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        DomainError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn domain_errors_follow_the_status_table() {
        assert_eq!(status_of(DomainError::validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(DomainError::conflict("dup")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(DomainError::invariant("admin")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(DomainError::forbidden("role")), StatusCode::FORBIDDEN);
        assert_eq!(status_of(DomainError::not_found("gone")), StatusCode::NOT_FOUND);
    }

    #[test]
    fn duplicates_are_400_and_backend_failures_500() {
        assert_eq!(
            status_of(StoreError::Duplicate("code".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(StoreError::backend("insert_article", "boom")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn login_failures_map_to_distinct_statuses() {
        let status = |e: LoginError<StoreError>| status_of(ApiError::from(e));
        assert_eq!(status(LoginError::AccountLocked), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status(LoginError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status(LoginError::InactiveAccount), StatusCode::FORBIDDEN);
    }
}
