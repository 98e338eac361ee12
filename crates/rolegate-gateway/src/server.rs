//! Gateway server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{FromRef, Path, State, rejection::JsonRejection},
    http::{
        HeaderValue, Method, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::{get, post},
};
use rolegate_core::config::GatewayConfig;
use rolegate_core::validation::{parse_id, validate_username};
use rolegate_core::{AccountId, Config, RoleId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::GatewayError;
use crate::auth::{
    AuthError, AuthState, CreateAccount, CreateRole, LoginRequest, RequestContext, RequireAdmin,
    RequireAuth,
};
use crate::middleware::LoginRateLimiter;

/// How often idle usernames are dropped from the login limiter.
const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// State shared across handlers.
#[derive(Clone, FromRef)]
pub struct GatewayState {
    /// Authentication state.
    pub auth: Arc<AuthState>,
    /// Login attempt limiter.
    pub login_limiter: Arc<LoginRateLimiter>,
}

impl GatewayState {
    /// Build handler state around an auth state.
    #[must_use]
    pub fn new(auth: Arc<AuthState>) -> Self {
        let login_limiter = Arc::new(LoginRateLimiter::new(
            auth.config.login_attempts_per_minute,
        ));
        Self {
            auth,
            login_limiter,
        }
    }
}

/// Successful response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wrap `data` in a success envelope.
    pub const fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Gateway server.
pub struct Gateway {
    config: GatewayConfig,
    state: GatewayState,
}

/// Builder for constructing a Gateway with its dependencies.
pub struct GatewayBuilder {
    config: Config,
    auth_state: Option<Arc<AuthState>>,
}

impl GatewayBuilder {
    /// Create a new builder with default config.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            auth_state: None,
        }
    }

    /// Set configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use an already initialized auth state.
    #[must_use]
    pub fn with_auth_state(mut self, auth: Arc<AuthState>) -> Self {
        self.auth_state = Some(auth);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// Returns error if the data directory or credential store cannot be
    /// opened.
    pub fn build(self) -> Result<Gateway, GatewayError> {
        let auth = match self.auth_state {
            Some(auth) => auth,
            None => {
                let data_dir = self.config.data_dir();
                std::fs::create_dir_all(&data_dir).map_err(|e| {
                    GatewayError::Config(format!("Failed to create data dir: {e}"))
                })?;
                Arc::new(
                    AuthState::initialize(self.config.auth.clone(), &data_dir)
                        .map_err(|e| GatewayError::Config(format!("Auth init failed: {e}")))?,
                )
            }
        };

        Ok(Gateway {
            config: self.config.gateway,
            state: GatewayState::new(auth),
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Gateway {
    /// Shared handler state.
    #[must_use]
    pub const fn state(&self) -> &GatewayState {
        &self.state
    }

    /// The fully layered router.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), &self.config)
    }

    /// Run until Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot bind or the server fails.
    pub async fn run(&self) -> Result<(), GatewayError> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` resolves, then drain in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot bind or the server fails.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let auth = &self.state.auth;

        // Auto-setup from environment if configured
        if let Err(e) = auth.bootstrap.auto_setup_from_env().await {
            tracing::warn!("Auto-setup from env failed: {}", e);
        }

        let status = auth.bootstrap.status();
        if status.roles_empty {
            tracing::info!(
                role = %auth.config.admin_role,
                "No roles exist; the first POST /roles must create the admin role"
            );
        }
        if status.accounts_empty {
            tracing::info!("No accounts exist; the first POST /accounts is admitted without a token");
        }

        let addr: SocketAddr = self
            .config
            .socket_addr()
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid address: {e}")))?;

        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        tracing::info!("Gateway API listening on http://{}", addr);

        let limiter = self.state.login_limiter.clone();
        let pruner = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LIMITER_PRUNE_INTERVAL);
            loop {
                ticker.tick().await;
                limiter.prune();
            }
        });

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;
        pruner.abort();
        served.map_err(|e| GatewayError::Server(e.to_string()))?;

        auth.store
            .flush()
            .map_err(|e| GatewayError::Server(e.to_string()))?;
        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Resolves on Ctrl+C.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Build the router with every route and layer.
pub fn build_router(state: GatewayState, config: &GatewayConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/setup/status", get(setup_status_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/me", get(me_handler))
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/{id}", get(get_account).delete(delete_account))
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/{id}", get(get_role).delete(delete_role))
        .route(
            "/account-roles/accounts/{account_id}/roles",
            get(list_account_roles).post(create_assignment),
        )
        .route(
            "/account-roles/accounts/{account_id}/roles/{role_id}",
            get(get_assignment).delete(delete_assignment),
        )
        .with_state(state);

    if config.cors {
        router = router.layer(cors_layer(config));
    }

    router.layer(
        ServiceBuilder::new()
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(TraceLayer::new_for_http()),
    )
}

fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    if config.cors_origins.is_empty() {
        return layer.allow_origin(cors::Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "message": "Internal server error",
            "code": "server_error",
        })),
    )
        .into_response()
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| AuthError::Validation(e.body_text()))
}

fn account_id(raw: &str) -> Result<AccountId, AuthError> {
    Ok(AccountId::new(parse_id("accountId", raw)?))
}

fn role_id(raw: &str) -> Result<RoleId, AuthError> {
    Ok(RoleId::new(parse_id("roleId", raw)?))
}

type HandlerResult = Result<Response, AuthError>;

async fn health_handler() -> impl IntoResponse {
    ApiResponse::ok(json!({ "status": "ok" }))
}

async fn setup_status_handler(State(auth): State<Arc<AuthState>>) -> impl IntoResponse {
    ApiResponse::ok(json!({ "setup": auth.bootstrap.status() }))
}

async fn login_handler(
    State(state): State<GatewayState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> HandlerResult {
    let LoginRequest { username, password } = body(payload)?;
    // Budget per account, not per spelling of its name
    let username = validate_username(&username)?;

    if !state.login_limiter.check(&username) {
        tracing::warn!(username = %username, "Login rate limit exceeded");
        return Err(AuthError::RateLimited);
    }

    let auth = state.auth.clone();
    let response = tokio::task::spawn_blocking(move || auth.login(&username, &password))
        .await
        .map_err(|e| AuthError::TaskJoin(e.to_string()))??;
    Ok(ApiResponse::ok(response).into_response())
}

async fn me_handler(RequireAuth(identity): RequireAuth) -> impl IntoResponse {
    ApiResponse::ok(json!({ "identity": identity }))
}

async fn list_accounts(
    RequireAuth(_): RequireAuth,
    State(auth): State<Arc<AuthState>>,
) -> HandlerResult {
    let accounts: Vec<_> = auth
        .store
        .list_accounts()?
        .iter()
        .map(|account| account.to_public())
        .collect();
    Ok(ApiResponse::ok(json!({ "accounts": accounts })).into_response())
}

async fn get_account(
    RequireAuth(_): RequireAuth,
    State(auth): State<Arc<AuthState>>,
    Path(id): Path<String>,
) -> HandlerResult {
    let id = account_id(&id)?;
    let account = auth
        .store
        .get_account(id)?
        .ok_or_else(|| AuthError::NotFound(format!("Account {id}")))?;
    let roles = auth.store.list_roles_for_account(id)?;
    Ok(ApiResponse::ok(json!({ "account": account.to_public(), "roles": roles })).into_response())
}

async fn create_account(
    State(auth): State<Arc<AuthState>>,
    ctx: RequestContext,
    payload: Result<Json<CreateAccount>, JsonRejection>,
) -> HandlerResult {
    let admission = auth.bootstrap.admit_account(ctx).await?;
    let created = auth
        .bootstrap
        .create_account(admission, body(payload)?)
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(json!({
            "account": created.record.to_public(),
            "bootstrap": created.bootstrap,
        })),
    )
        .into_response())
}

async fn delete_account(
    RequireAdmin(identity): RequireAdmin,
    State(auth): State<Arc<AuthState>>,
    Path(id): Path<String>,
) -> HandlerResult {
    let id = account_id(&id)?;
    if !auth.store.delete_account(id)? {
        return Err(AuthError::NotFound(format!("Account {id}")));
    }
    tracing::info!(account_id = %id, by = %identity.account_id, "Account deleted");
    Ok(ApiResponse::ok(json!({ "deleted": id })).into_response())
}

async fn list_roles(
    RequireAuth(_): RequireAuth,
    State(auth): State<Arc<AuthState>>,
) -> HandlerResult {
    let roles = auth.store.list_roles()?;
    Ok(ApiResponse::ok(json!({ "roles": roles })).into_response())
}

async fn get_role(
    RequireAuth(_): RequireAuth,
    State(auth): State<Arc<AuthState>>,
    Path(id): Path<String>,
) -> HandlerResult {
    let id = role_id(&id)?;
    let role = auth
        .store
        .get_role(id)?
        .ok_or_else(|| AuthError::NotFound(format!("Role {id}")))?;
    Ok(ApiResponse::ok(json!({ "role": role })).into_response())
}

async fn create_role(
    State(auth): State<Arc<AuthState>>,
    ctx: RequestContext,
    payload: Result<Json<CreateRole>, JsonRejection>,
) -> HandlerResult {
    let admission = auth.bootstrap.admit_role(ctx).await?;
    let created = auth.bootstrap.create_role(admission, body(payload)?)?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(json!({
            "role": created.record,
            "bootstrap": created.bootstrap,
        })),
    )
        .into_response())
}

async fn delete_role(
    RequireAdmin(identity): RequireAdmin,
    State(auth): State<Arc<AuthState>>,
    Path(id): Path<String>,
) -> HandlerResult {
    let id = role_id(&id)?;
    if !auth.store.delete_role(id)? {
        return Err(AuthError::NotFound(format!("Role {id}")));
    }
    tracing::info!(role_id = %id, by = %identity.account_id, "Role deleted");
    Ok(ApiResponse::ok(json!({ "deleted": id })).into_response())
}

/// Body of an assignment create.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignRole {
    role_id: u64,
}

async fn list_account_roles(
    RequireAuth(_): RequireAuth,
    State(auth): State<Arc<AuthState>>,
    Path(account): Path<String>,
) -> HandlerResult {
    let account = account_id(&account)?;
    if auth.store.get_account(account)?.is_none() {
        return Err(AuthError::NotFound(format!("Account {account}")));
    }
    let roles = auth.store.list_roles_for_account(account)?;
    Ok(ApiResponse::ok(json!({ "roles": roles })).into_response())
}

async fn get_assignment(
    RequireAuth(_): RequireAuth,
    State(auth): State<Arc<AuthState>>,
    Path((account, role)): Path<(String, String)>,
) -> HandlerResult {
    let (account, role) = (account_id(&account)?, role_id(&role)?);
    let assignment = auth
        .store
        .find_assignment(account, role)?
        .ok_or_else(|| AuthError::NotFound("Assignment".to_string()))?;
    Ok(ApiResponse::ok(json!({ "assignment": assignment })).into_response())
}

async fn create_assignment(
    RequireAdmin(identity): RequireAdmin,
    State(auth): State<Arc<AuthState>>,
    Path(account): Path<String>,
    payload: Result<Json<AssignRole>, JsonRejection>,
) -> HandlerResult {
    let account = account_id(&account)?;
    let role = role_id(&body(payload)?.role_id.to_string())?;

    let assignment = auth.store.insert_assignment(account, role)?;
    tracing::info!(
        account_id = %account,
        role_id = %role,
        by = %identity.account_id,
        "Role assigned"
    );

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(json!({ "assignment": assignment })),
    )
        .into_response())
}

async fn delete_assignment(
    RequireAdmin(identity): RequireAdmin,
    State(auth): State<Arc<AuthState>>,
    Path((account, role)): Path<(String, String)>,
) -> HandlerResult {
    let (account, role) = (account_id(&account)?, role_id(&role)?);
    if !auth.store.delete_assignment(account, role)? {
        return Err(AuthError::NotFound("Assignment".to_string()));
    }
    tracing::info!(
        account_id = %account,
        role_id = %role,
        by = %identity.account_id,
        "Role unassigned"
    );
    Ok(ApiResponse::ok(json!({ "deleted": true })).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = Some(dir.path().to_path_buf());
        config
    }

    #[test]
    fn test_builder() {
        let temp_dir = TempDir::new().unwrap();
        let gateway = GatewayBuilder::new()
            .with_config(config_in(&temp_dir))
            .build()
            .unwrap();

        assert!(gateway.state().auth.store.accounts_empty());
        let _router = gateway.router();
    }

    #[test]
    fn test_builder_with_auth_state() {
        let temp_dir = TempDir::new().unwrap();
        let auth = Arc::new(
            AuthState::initialize(rolegate_core::AuthConfig::default(), temp_dir.path()).unwrap(),
        );
        let gateway = GatewayBuilder::new()
            .with_auth_state(auth.clone())
            .build()
            .unwrap();
        assert!(Arc::ptr_eq(&gateway.state().auth, &auth));
    }

    #[test]
    fn test_cors_origins() {
        let mut config = GatewayConfig::default();
        config.cors_origins = vec!["https://admin.example.com".to_string(), "\n".to_string()];
        let _layer = cors_layer(&config);
    }

    #[test]
    fn test_id_parsing() {
        assert_eq!(account_id("12").unwrap(), AccountId::new(12));
        assert!(matches!(account_id("0"), Err(AuthError::Validation(_))));
        assert!(matches!(role_id("x"), Err(AuthError::Validation(_))));
    }
}
