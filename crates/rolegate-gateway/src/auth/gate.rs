//! Authentication and authorization gates.
//!
//! A protected operation runs an ordered [`GuardChain`] over a
//! [`RequestContext`]. Each guard either returns the context (possibly
//! enriched with an [`Identity`]) or short-circuits with an [`AuthError`].
//! Neither gate touches the credential store: a token is verified purely
//! cryptographically.

use std::sync::Arc;

use axum::http::{HeaderMap, header::AUTHORIZATION};
use rolegate_core::AccountId;
use serde::Serialize;

use super::AuthError;
use super::jwt::TokenCodec;

/// Authenticated caller, decoded from a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Subject of the token.
    pub account_id: AccountId,
    /// Role names snapshotted at issuance.
    pub roles: Vec<String>,
}

impl Identity {
    /// Case-insensitive role membership.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        let wanted = role.to_lowercase();
        self.roles.iter().any(|held| held.to_lowercase() == wanted)
    }
}

/// Per-request state threaded through the guard chain.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    authorization: Option<String>,
    identity: Option<Identity>,
    bootstrap: bool,
}

impl RequestContext {
    /// Context carrying the raw `Authorization` header value, if any.
    #[must_use]
    pub fn new(authorization: Option<String>) -> Self {
        Self {
            authorization,
            identity: None,
            bootstrap: false,
        }
    }

    /// Build a context from request headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let authorization = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        Self::new(authorization)
    }

    /// Mark this request as a bootstrap create. Guard chains pass it through.
    #[must_use]
    pub fn into_bootstrap(mut self) -> Self {
        self.bootstrap = true;
        self
    }

    /// Whether this is a bootstrap create.
    #[must_use]
    pub const fn is_bootstrap(&self) -> bool {
        self.bootstrap
    }

    /// Raw authorization header.
    #[must_use]
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    /// Identity attached by [`Authenticate`].
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Take the identity out of the context.
    #[must_use]
    pub fn into_identity(self) -> Option<Identity> {
        self.identity
    }

    #[must_use]
    fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }
}

/// One stage of a guard chain.
pub trait Guard: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Continue with a (possibly enriched) context or reject.
    ///
    /// # Errors
    ///
    /// Returns the rejection for this stage.
    fn check(&self, ctx: RequestContext) -> Result<RequestContext, AuthError>;
}

/// Ordered list of guards, run first to last.
#[derive(Default)]
pub struct GuardChain {
    guards: Vec<Box<dyn Guard>>,
}

impl GuardChain {
    /// Empty chain; admits everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a guard.
    #[must_use]
    pub fn then(mut self, guard: impl Guard + 'static) -> Self {
        self.guards.push(Box::new(guard));
        self
    }

    /// Chain that only requires a valid token.
    #[must_use]
    pub fn authenticated(codec: Arc<TokenCodec>) -> Self {
        Self::new().then(Authenticate::new(codec))
    }

    /// Chain that requires a valid token carrying `role`.
    #[must_use]
    pub fn with_role(codec: Arc<TokenCodec>, role: impl Into<String>) -> Self {
        Self::authenticated(codec).then(require_role(role))
    }

    /// Run every guard in order. Bootstrap contexts pass through untouched.
    ///
    /// # Errors
    ///
    /// Returns the first rejection.
    pub fn run(&self, ctx: RequestContext) -> Result<RequestContext, AuthError> {
        if ctx.is_bootstrap() {
            tracing::debug!("Bootstrap create bypasses guard chain");
            return Ok(ctx);
        }

        self.guards.iter().try_fold(ctx, |ctx, guard| {
            guard.check(ctx).inspect_err(|e| {
                tracing::debug!(guard = guard.name(), error = %e, "Guard rejected request");
            })
        })
    }

    /// Number of guards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    /// Whether the chain has no guards.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

impl std::fmt::Debug for GuardChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.guards.iter().map(|g| g.name()).collect();
        f.debug_struct("GuardChain").field("guards", &names).finish()
    }
}

/// Authentication gate: verifies the bearer token and attaches the identity.
pub struct Authenticate {
    codec: Arc<TokenCodec>,
}

impl Authenticate {
    /// Create the gate over a codec.
    #[must_use]
    pub const fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }
}

impl Guard for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    fn check(&self, ctx: RequestContext) -> Result<RequestContext, AuthError> {
        let identity = guard_authenticated(&self.codec, ctx.authorization())?;
        Ok(ctx.with_identity(identity))
    }
}

/// Authorization gate for one role name.
#[derive(Debug, Clone)]
pub struct RequireRole {
    role: String,
}

impl Guard for RequireRole {
    fn name(&self) -> &'static str {
        "require_role"
    }

    fn check(&self, ctx: RequestContext) -> Result<RequestContext, AuthError> {
        let identity = ctx.identity().ok_or(AuthError::Unauthenticated)?;
        guard_authorized(identity, &self.role)?;
        Ok(ctx)
    }
}

/// Build an authorization guard for `role`. Place it after [`Authenticate`].
#[must_use]
pub fn require_role(role: impl Into<String>) -> RequireRole {
    RequireRole { role: role.into() }
}

/// Verify a raw `Authorization` header value.
///
/// # Errors
///
/// Returns `Unauthenticated` for a missing or non-bearer header and for any
/// token failure. The failure subtype is only logged.
pub fn guard_authenticated(
    codec: &TokenCodec,
    authorization: Option<&str>,
) -> Result<Identity, AuthError> {
    let Some(header) = authorization else {
        tracing::debug!("Missing Authorization header");
        return Err(AuthError::Unauthenticated);
    };

    let Some(token) = TokenCodec::extract_from_header(header) else {
        tracing::debug!("Authorization header is not a bearer token");
        return Err(AuthError::Unauthenticated);
    };

    let claims = codec.verify(token).map_err(|e| {
        tracing::debug!(reason = %e, "Token rejected");
        AuthError::Unauthenticated
    })?;

    let account_id = claims.account_id().map_err(|e| {
        tracing::debug!(reason = %e, "Token rejected");
        AuthError::Unauthenticated
    })?;

    Ok(Identity {
        account_id,
        roles: claims.roles,
    })
}

/// Check that an authenticated identity holds `role`.
///
/// # Errors
///
/// Returns `Forbidden`, with a distinct message when the identity has no
/// roles at all.
pub fn guard_authorized(identity: &Identity, role: &str) -> Result<(), AuthError> {
    if identity.roles.is_empty() {
        return Err(AuthError::Forbidden(
            "account has no roles assigned".to_string(),
        ));
    }
    if !identity.has_role(role) {
        return Err(AuthError::Forbidden(format!("role '{role}' required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(
            &TokenCodec::generate_secret(),
            Duration::from_secs(3600),
        ))
    }

    fn identity(roles: &[&str]) -> Identity {
        Identity {
            account_id: AccountId::new(1),
            roles: roles.iter().map(ToString::to_string).collect(),
        }
    }

    fn bearer(codec: &TokenCodec, roles: &[&str]) -> String {
        let issued = codec
            .issue(
                AccountId::new(5),
                roles.iter().map(ToString::to_string).collect(),
            )
            .unwrap();
        format!("Bearer {}", issued.token)
    }

    #[test]
    fn test_role_gate() {
        assert!(matches!(
            guard_authorized(&identity(&["user"]), "admin"),
            Err(AuthError::Forbidden(_))
        ));
        assert!(guard_authorized(&identity(&["admin", "user"]), "admin").is_ok());
        assert!(guard_authorized(&identity(&["Admin"]), "ADMIN").is_ok());
    }

    #[test]
    fn test_empty_roles_message_differs() {
        let AuthError::Forbidden(empty) = guard_authorized(&identity(&[]), "admin").unwrap_err()
        else {
            panic!("expected Forbidden");
        };
        let AuthError::Forbidden(mismatch) =
            guard_authorized(&identity(&["user"]), "admin").unwrap_err()
        else {
            panic!("expected Forbidden");
        };
        assert_ne!(empty, mismatch);
    }

    #[test]
    fn test_authenticate_attaches_identity() {
        let codec = codec();
        let header = bearer(&codec, &["Admin"]);

        let identity = guard_authenticated(&codec, Some(&header)).unwrap();
        assert_eq!(identity.account_id, AccountId::new(5));
        assert_eq!(identity.roles, vec!["Admin".to_string()]);
    }

    #[test]
    fn test_authenticate_rejections() {
        let codec = codec();
        assert!(matches!(
            guard_authenticated(&codec, None),
            Err(AuthError::Unauthenticated)
        ));
        assert!(matches!(
            guard_authenticated(&codec, Some("Token abc")),
            Err(AuthError::Unauthenticated)
        ));
        assert!(matches!(
            guard_authenticated(&codec, Some("Bearer not.a.token")),
            Err(AuthError::Unauthenticated)
        ));

        let foreign = bearer(&self::codec(), &["admin"]);
        assert!(matches!(
            guard_authenticated(&codec, Some(&foreign)),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn test_chain_order() {
        let codec = codec();
        let chain = GuardChain::with_role(codec.clone(), "admin");
        assert_eq!(chain.len(), 2);

        let no_token = chain.run(RequestContext::new(None));
        assert!(matches!(no_token, Err(AuthError::Unauthenticated)));

        let user = chain.run(RequestContext::new(Some(bearer(&codec, &["user"]))));
        assert!(matches!(user, Err(AuthError::Forbidden(_))));

        let admin = chain
            .run(RequestContext::new(Some(bearer(&codec, &["user", "ADMIN"]))))
            .unwrap();
        assert!(admin.identity().unwrap().has_role("admin"));
    }

    #[test]
    fn test_role_guard_alone_never_admits_unauthenticated() {
        let chain = GuardChain::new().then(require_role("admin"));
        let result = chain.run(RequestContext::new(None));
        assert!(matches!(result, Err(AuthError::Unauthenticated)));
    }

    #[test]
    fn test_bootstrap_context_bypasses() {
        let chain = GuardChain::with_role(codec(), "admin");
        let ctx = chain
            .run(RequestContext::new(None).into_bootstrap())
            .unwrap();
        assert!(ctx.is_bootstrap());
        assert!(ctx.identity().is_none());
    }

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer abc".parse().unwrap());
        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.authorization(), Some("Bearer abc"));
        assert!(RequestContext::from_headers(&HeaderMap::new())
            .authorization()
            .is_none());
    }
}
