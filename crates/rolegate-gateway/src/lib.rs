//! # Rolegate Gateway
//!
//! HTTP gateway for role-gated account and role management.
//!
//! Tokens are signed HS256 JWTs carrying the caller's role names. An empty
//! accounts or roles table admits one unauthenticated create so the first
//! administrator can be provisioned.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and authorization.
pub mod auth;
mod middleware;
mod server;

pub use auth::{AuthError, AuthState, BootstrapController, CredentialStore, TokenCodec};
pub use middleware::LoginRateLimiter;
pub use server::{ApiResponse, Gateway, GatewayBuilder, GatewayState, build_router, shutdown_signal};

use rolegate_core::Config;

/// Start the gateway server.
///
/// # Errors
///
/// Returns error if server fails to start.
pub async fn start(config: Config) -> Result<(), GatewayError> {
    let gateway = GatewayBuilder::new().with_config(config).build()?;
    gateway.run().await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
