//! Authentication extractors and error responses for axum.

use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use rolegate_core::{AuthConfig, Password, scrub_secrets};
use serde::Serialize;

use super::AuthError;
use super::bootstrap::BootstrapController;
use super::gate::{GuardChain, Identity, RequestContext};
use super::jwt::TokenCodec;
use super::login::{LoginResponse, authenticate};
use super::store::CredentialStore;

/// Shared authentication state.
pub struct AuthState {
    /// Auth configuration.
    pub config: AuthConfig,
    /// Token codec.
    pub codec: Arc<TokenCodec>,
    /// Credential store.
    pub store: Arc<CredentialStore>,
    /// Guards for any authenticated caller.
    pub authenticated: Arc<GuardChain>,
    /// Guards for callers holding the admin role.
    pub admin: Arc<GuardChain>,
    /// Bootstrap controller for account and role creation.
    pub bootstrap: BootstrapController,
}

impl AuthState {
    /// Create a new auth state.
    #[must_use]
    pub fn new(config: AuthConfig, codec: TokenCodec, store: CredentialStore) -> Self {
        let codec = Arc::new(codec);
        let store = Arc::new(store);
        let authenticated = Arc::new(GuardChain::authenticated(codec.clone()));
        let admin = Arc::new(GuardChain::with_role(codec.clone(), &config.admin_role));
        let bootstrap = BootstrapController::new(store.clone(), admin.clone(), &config);

        Self {
            config,
            codec,
            store,
            authenticated,
            admin,
            bootstrap,
        }
    }

    /// Initialize auth state, generating a signing secret if none is set.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened or the secret is invalid.
    pub fn initialize(mut config: AuthConfig, data_dir: &Path) -> Result<Self, AuthError> {
        let store = CredentialStore::open(data_dir)?;

        let secret = match &config.jwt_secret {
            Some(secret) => secret.clone(),
            None => {
                let secret = TokenCodec::generate_hex_secret();
                config.jwt_secret = Some(secret.clone());
                tracing::warn!(
                    "No auth.jwtSecret configured; generated an ephemeral secret. Tokens will not survive a restart"
                );
                secret
            }
        };

        let codec = TokenCodec::from_hex_secret(&secret, config.token_ttl())?;
        Ok(Self::new(config, codec, store))
    }

    /// Verify credentials and issue a token.
    ///
    /// # Errors
    ///
    /// See [`authenticate`].
    pub fn login(&self, username: &str, password: &Password) -> Result<LoginResponse, AuthError> {
        authenticate(
            &self.store,
            &self.codec,
            &self.config.password_policy,
            username,
            password,
        )
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("admin_role", &self.config.admin_role)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    code: &'static str,
}

impl AuthError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidCredentials | Self::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Storage(_)
            | Self::BootstrapRollback(_)
            | Self::Config(_)
            | Self::TaskJoin(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = if self.is_server_error() {
            tracing::error!(error = %scrub_secrets(&self.to_string()), "Request failed with server error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            success: false,
            message,
            code: self.code(),
        };

        (self.status_code(), Json(body)).into_response()
    }
}

/// The raw request context, for operations that decide their own guards.
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Extractor for authenticated requests.
///
/// Use this in handler parameters to require a valid token.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub Identity);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
    Arc<AuthState>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = Arc::<AuthState>::from_ref(state);
        run_chain(&auth_state.authenticated, parts).map(Self)
    }
}

/// Require admin role extractor.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Identity);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    Arc<AuthState>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = Arc::<AuthState>::from_ref(state);
        run_chain(&auth_state.admin, parts).map(Self)
    }
}

fn run_chain(chain: &GuardChain, parts: &Parts) -> Result<Identity, AuthError> {
    chain
        .run(RequestContext::from_headers(&parts.headers))?
        .into_identity()
        .ok_or(AuthError::Unauthenticated)
}
