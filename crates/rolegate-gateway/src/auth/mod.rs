//! Authentication and authorization for the gateway.
//!
//! This module provides:
//! - Credential storage with uniqueness enforced in sled transactions
//! - Argon2 password hashing and constant-time verification
//! - Signed bearer tokens carrying a role snapshot
//! - Composable authentication and authorization guards
//! - Bootstrap of the first role and first account in an empty system

/// Bootstrap consistency controller.
pub mod bootstrap;
/// Guard chain over a request context.
pub mod gate;
mod jwt;
mod login;
mod middleware;
mod password;
/// Credential store.
pub mod store;

pub use bootstrap::{
    Admission, BootstrapController, CreateAccount, CreateRole, Created, SetupStatus,
};
pub use gate::{
    Authenticate, Guard, GuardChain, Identity, RequestContext, RequireRole, guard_authenticated,
    guard_authorized, require_role,
};
pub use jwt::{Claims, IssuedToken, TokenCodec, TokenError};
pub use login::{LoginRequest, LoginResponse, authenticate};
pub use middleware::{AuthState, RequireAdmin, RequireAuth};
pub use password::{hash_password, hash_password_blocking, verify_password};
pub use store::{Account, Assignment, CredentialStore, NewAccount, PublicAccount, Role};

use rolegate_core::ValidationError;
use thiserror::Error;

/// Authentication errors.
///
/// The variants map onto HTTP status codes in [`AuthError::status_code`].
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input, caught before any store access.
    #[error("{0}")]
    Validation(String),

    /// Login failure. Deliberately does not say which part was wrong.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Missing, malformed, tampered, or expired bearer token.
    #[error("Authentication required")]
    Unauthenticated,

    /// Valid identity without the required role.
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Uniqueness violation.
    #[error("{0}")]
    Conflict(String),

    /// Referenced row does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Too many login attempts.
    #[error("Too many login attempts, try again later")]
    RateLimited,

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Account bootstrap failed and the created account was removed.
    #[error("Bootstrap failed: {0}")]
    BootstrapRollback(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// A blocking hash or verify task did not complete.
    #[error("Task join error: {0}")]
    TaskJoin(String),
}

impl AuthError {
    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::RateLimited => "rate_limited",
            Self::Storage(_)
            | Self::BootstrapRollback(_)
            | Self::Config(_)
            | Self::TaskJoin(_) => "server_error",
        }
    }

    /// Whether this is a server-side failure whose detail must stay internal.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::BootstrapRollback(_) | Self::Config(_) | Self::TaskJoin(_)
        )
    }
}

impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<sled::Error> for AuthError {
    fn from(err: sled::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(AuthError::Unauthenticated.code(), "unauthenticated");
        assert_eq!(AuthError::Forbidden("x".into()).code(), "forbidden");
        assert_eq!(
            AuthError::BootstrapRollback("x".into()).code(),
            "server_error"
        );
        assert!(AuthError::Storage("disk".into()).is_server_error());
        assert!(!AuthError::InvalidCredentials.is_server_error());
        assert!(AuthError::TaskJoin("cancelled".into()).is_server_error());
    }

    #[test]
    fn test_validation_conversion() {
        let err: AuthError = ValidationError::Empty { field: "username" }.into();
        assert!(matches!(err, AuthError::Validation(ref m) if m == "username is required"));
    }
}
