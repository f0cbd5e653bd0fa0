//! Unified service-level error.
//!
//! Wraps domain errors and infrastructure failures in one type that maps to an
//! HTTP response without leaking internal detail across the trust boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{DomainError, ErrorCode, ErrorKind};
use serde::Serialize;
use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    /// Business rule violation raised by an aggregate or a service check
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Access denied")]
    Forbidden,

    /// Deadline elapsed or caller went away before completion
    #[error("Operation cancelled")]
    Cancelled,

    #[cfg(feature = "jwt")]
    #[error("Token signing error")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[cfg(feature = "cache")]
    #[error("Cache error")]
    Cache(#[from] redis::RedisError),

    #[error("Internal server error")]
    Internal(String),
}

/// Error response body for HTTP
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl AppError {
    /// Get error code for client
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Domain(e) if e.kind() == ErrorKind::Internal => "INTERNAL_ERROR",
            AppError::Domain(e) => e.code().as_str(),
            AppError::Forbidden => "FORBIDDEN",
            AppError::Cancelled => "CANCELLED",
            #[cfg(feature = "jwt")]
            AppError::Jwt(_) => "INTERNAL_ERROR",
            #[cfg(feature = "cache")]
            AppError::Cache(_) => "INTERNAL_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Domain error code, if this wraps a domain error.
    pub fn domain_code(&self) -> Option<ErrorCode> {
        match self {
            AppError::Domain(e) => Some(e.code()),
            _ => None,
        }
    }

    /// Error category; infrastructure failures count as internal.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AppError::Domain(e) => Some(e.kind()),
            AppError::Forbidden | AppError::Cancelled => None,
            _ => Some(ErrorKind::Internal),
        }
    }

    /// Get HTTP status code
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Domain(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Conflict | ErrorKind::StateConflict => StatusCode::CONFLICT,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::AuthFailure => StatusCode::UNAUTHORIZED,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get user-facing message (hides internal details)
    pub fn user_message(&self) -> String {
        match self {
            AppError::Domain(e) if e.kind() == ErrorKind::Internal => {
                tracing::error!(code = %e.code(), "Internal domain error: {}", e.message());
                "An internal error occurred".to_string()
            }
            AppError::Domain(e) => e.message().to_string(),

            #[cfg(feature = "jwt")]
            AppError::Jwt(e) => {
                tracing::error!("JWT error: {:?}", e);
                "An internal error occurred".to_string()
            }
            #[cfg(feature = "cache")]
            AppError::Cache(e) => {
                tracing::error!("Cache error: {:?}", e);
                "An internal error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }

            _ => self.to_string(),
        }
    }
}

// =============================================================================
// HTTP Response (Axum)
// =============================================================================

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.user_message(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self, code: ErrorCode) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, code: ErrorCode) -> AppResult<T> {
        self.ok_or_else(|| {
            let msg = match code {
                ErrorCode::UserNotFound => "User not found",
                ErrorCode::RoleNotFound => "Role not found",
                _ => "Resource not found",
            };
            AppError::Domain(DomainError::not_found(code, msg))
        })
    }
}

/// Convenience constructors
impl AppError {
    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    pub fn conflict(code: ErrorCode, msg: impl Into<String>) -> Self {
        AppError::Domain(DomainError::conflict(code, msg))
    }

    pub fn auth(code: ErrorCode, msg: impl Into<String>) -> Self {
        AppError::Domain(DomainError::auth(code, msg))
    }

    pub fn state(code: ErrorCode, msg: impl Into<String>) -> Self {
        AppError::Domain(DomainError::state(code, msg))
    }

    /// True for the given domain error code.
    pub fn is(&self, code: ErrorCode) -> bool {
        self.domain_code() == Some(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_codes_pass_through() {
        let err = AppError::from(DomainError::conflict(ErrorCode::RoleCodeExists, "taken"));
        assert_eq!(err.code(), "ROLE_CODE_EXISTS");
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.user_message(), "taken");
        assert!(err.is(ErrorCode::RoleCodeExists));
    }

    #[test]
    fn test_internal_detail_hidden() {
        let err = AppError::internal("connection refused at 10.0.0.3:5432");
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.user_message().contains("10.0.0.3"));

        let err = AppError::from(DomainError::internal(ErrorCode::PasswordHashFailed, "salt"));
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(err.user_message(), "An internal error occurred");
    }

    #[test]
    fn test_auth_failures_are_unauthorized() {
        let err = AppError::from(DomainError::invalid_credentials());
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), "INVALID_CREDENTIALS");
    }

    #[test]
    fn test_forbidden_and_cancelled() {
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Cancelled.code(), "CANCELLED");
        assert_eq!(AppError::Cancelled.kind(), None);
    }

    #[test]
    fn test_option_ext() {
        let err = None::<u8>.ok_or_not_found(ErrorCode::UserNotFound).unwrap_err();
        assert!(err.is(ErrorCode::UserNotFound));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
