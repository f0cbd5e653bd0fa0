//! Domain-level errors.
//!
//! Every business rule violation maps onto one [`ErrorKind`] and carries a
//! stable [`ErrorCode`], so callers branch on codes instead of comparing strings.
//! These errors are independent of infrastructure concerns (HTTP, database).

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Broad category of a domain failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input. Never retried.
    Validation,
    /// Duplicate value or stale version. The caller may retry with fresh data.
    Conflict,
    /// Entity, permission, assignment or data scope absent.
    NotFound,
    /// Operation not allowed in the current lifecycle state.
    StateConflict,
    /// Credential, account or token rejection. Messages stay generic.
    AuthFailure,
    /// Unexpected failure. Detail must not cross the trust boundary.
    Internal,
}

/// Machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation
    InvalidPermission,
    InvalidDataScope,
    InvalidRoleCode,
    InvalidRoleName,
    InvalidUsername,
    InvalidPassword,
    InvalidEmail,
    InvalidPhone,
    InvalidDisplayName,
    InvalidAvatar,
    InvalidRoleId,

    // Conflict
    PermissionAlreadyGranted,
    RoleAlreadyAssigned,
    RoleCodeExists,
    UsernameExists,
    EmailExists,
    VersionConflict,

    // NotFound
    PermissionNotFound,
    DataScopeNotFound,
    RoleNotAssigned,
    RoleNotFound,
    UserNotFound,

    // StateConflict
    AlreadyEnabled,
    AlreadyDisabled,
    AlreadyActive,
    AlreadyDeactivated,
    UserDeactivated,
    NotLocked,
    SystemRoleNotDeletable,
    RoleInUse,

    // AuthFailure
    InvalidCredentials,
    PasswordMismatch,
    AccountLocked,
    AccountDeactivated,
    AccountPending,
    TokenInvalid,
    TokenRevoked,
    TokenRefreshLimitExceeded,

    // Internal
    PasswordHashFailed,
    Internal,
}

impl ErrorCode {
    /// Wire representation, e.g. `PERMISSION_ALREADY_GRANTED`.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidPermission => "INVALID_PERMISSION",
            ErrorCode::InvalidDataScope => "INVALID_DATA_SCOPE",
            ErrorCode::InvalidRoleCode => "INVALID_ROLE_CODE",
            ErrorCode::InvalidRoleName => "INVALID_ROLE_NAME",
            ErrorCode::InvalidUsername => "INVALID_USERNAME",
            ErrorCode::InvalidPassword => "INVALID_PASSWORD",
            ErrorCode::InvalidEmail => "INVALID_EMAIL",
            ErrorCode::InvalidPhone => "INVALID_PHONE",
            ErrorCode::InvalidDisplayName => "INVALID_DISPLAY_NAME",
            ErrorCode::InvalidAvatar => "INVALID_AVATAR",
            ErrorCode::InvalidRoleId => "INVALID_ROLE_ID",
            ErrorCode::PermissionAlreadyGranted => "PERMISSION_ALREADY_GRANTED",
            ErrorCode::RoleAlreadyAssigned => "ROLE_ALREADY_ASSIGNED",
            ErrorCode::RoleCodeExists => "ROLE_CODE_EXISTS",
            ErrorCode::UsernameExists => "USERNAME_EXISTS",
            ErrorCode::EmailExists => "EMAIL_EXISTS",
            ErrorCode::VersionConflict => "VERSION_CONFLICT",
            ErrorCode::PermissionNotFound => "PERMISSION_NOT_FOUND",
            ErrorCode::DataScopeNotFound => "DATA_SCOPE_NOT_FOUND",
            ErrorCode::RoleNotAssigned => "ROLE_NOT_ASSIGNED",
            ErrorCode::RoleNotFound => "ROLE_NOT_FOUND",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::AlreadyEnabled => "ALREADY_ENABLED",
            ErrorCode::AlreadyDisabled => "ALREADY_DISABLED",
            ErrorCode::AlreadyActive => "ALREADY_ACTIVE",
            ErrorCode::AlreadyDeactivated => "ALREADY_DEACTIVATED",
            ErrorCode::UserDeactivated => "USER_DEACTIVATED",
            ErrorCode::NotLocked => "NOT_LOCKED",
            ErrorCode::SystemRoleNotDeletable => "SYSTEM_ROLE_NOT_DELETABLE",
            ErrorCode::RoleInUse => "ROLE_IN_USE",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::PasswordMismatch => "PASSWORD_MISMATCH",
            ErrorCode::AccountLocked => "ACCOUNT_LOCKED",
            ErrorCode::AccountDeactivated => "ACCOUNT_DEACTIVATED",
            ErrorCode::AccountPending => "ACCOUNT_PENDING",
            ErrorCode::TokenInvalid => "TOKEN_INVALID",
            ErrorCode::TokenRevoked => "TOKEN_REVOKED",
            ErrorCode::TokenRefreshLimitExceeded => "TOKEN_REFRESH_LIMIT_EXCEEDED",
            ErrorCode::PasswordHashFailed => "PASSWORD_HASH_FAILED",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-specific errors for business rule violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{1}")]
    Validation(ErrorCode, String),

    #[error("{1}")]
    Conflict(ErrorCode, String),

    #[error("{1}")]
    NotFound(ErrorCode, String),

    #[error("{1}")]
    StateConflict(ErrorCode, String),

    #[error("{1}")]
    AuthFailure(ErrorCode, String),

    #[error("{1}")]
    Internal(ErrorCode, String),
}

impl DomainError {
    pub fn validation(code: ErrorCode, msg: impl Into<String>) -> Self {
        DomainError::Validation(code, msg.into())
    }

    pub fn conflict(code: ErrorCode, msg: impl Into<String>) -> Self {
        DomainError::Conflict(code, msg.into())
    }

    pub fn not_found(code: ErrorCode, msg: impl Into<String>) -> Self {
        DomainError::NotFound(code, msg.into())
    }

    pub fn state(code: ErrorCode, msg: impl Into<String>) -> Self {
        DomainError::StateConflict(code, msg.into())
    }

    pub fn auth(code: ErrorCode, msg: impl Into<String>) -> Self {
        DomainError::AuthFailure(code, msg.into())
    }

    pub fn internal(code: ErrorCode, msg: impl Into<String>) -> Self {
        DomainError::Internal(code, msg.into())
    }

    /// The login rejection shared by "unknown user" and "wrong password".
    pub fn invalid_credentials() -> Self {
        DomainError::auth(ErrorCode::InvalidCredentials, "Invalid username or password")
    }

    /// Optimistic concurrency failure on save.
    pub fn version_conflict(expected: u64, actual: u64) -> Self {
        DomainError::conflict(
            ErrorCode::VersionConflict,
            format!("Version mismatch (expected {expected}, stored {actual})"),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(..) => ErrorKind::Validation,
            DomainError::Conflict(..) => ErrorKind::Conflict,
            DomainError::NotFound(..) => ErrorKind::NotFound,
            DomainError::StateConflict(..) => ErrorKind::StateConflict,
            DomainError::AuthFailure(..) => ErrorKind::AuthFailure,
            DomainError::Internal(..) => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            DomainError::Validation(code, _)
            | DomainError::Conflict(code, _)
            | DomainError::NotFound(code, _)
            | DomainError::StateConflict(code, _)
            | DomainError::AuthFailure(code, _)
            | DomainError::Internal(code, _) => *code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            DomainError::Validation(_, msg)
            | DomainError::Conflict(_, msg)
            | DomainError::NotFound(_, msg)
            | DomainError::StateConflict(_, msg)
            | DomainError::AuthFailure(_, msg)
            | DomainError::Internal(_, msg) => msg,
        }
    }
}

/// Result type alias for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
