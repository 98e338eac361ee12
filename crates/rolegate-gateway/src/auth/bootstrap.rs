//! Bootstrap of the first role and first account.
//!
//! Each protected collection is either Empty or Populated, decided solely by
//! its row count. While Empty, one create is admitted without a token; once a
//! row commits the normal admin guard chain applies again. Deleting every row
//! re-opens the bootstrap path.
//!
//! Creates are serialized per collection: the empty check and the bootstrap
//! writes happen under one async mutex, so two concurrent first creates cannot
//! both be admitted.
//!
//! Admission and creation are separate steps. HTTP handlers admit the caller
//! before they look at the request body, so an anonymous caller on a
//! populated table learns nothing about the expected input.

use std::marker::PhantomData;
use std::sync::Arc;

use rand::Rng;
use rolegate_core::config::PasswordPolicy;
use rolegate_core::validation::{
    alphanumeric, not_blank, validate_password, validate_person_name, validate_role_name,
    validate_username,
};
use rolegate_core::{AuthConfig, Collection, Password, RoleId};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use validator::Validate;

use super::AuthError;
use super::gate::{GuardChain, RequestContext};
use super::password::hash_password_blocking;
use super::store::{Account, CredentialStore, NewAccount, Role};

/// Account creation input.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccount {
    /// Username (alphanumeric, at most 20 characters).
    #[validate(
        length(min = 1, max = 20),
        custom(function = "alphanumeric")
    )]
    pub username: String,
    /// Plaintext password, checked against the password policy.
    pub password: Password,
    /// Optional first name.
    #[serde(default)]
    #[validate(length(max = 50))]
    pub first_name: Option<String>,
    /// Optional last name.
    #[serde(default)]
    #[validate(length(max = 50))]
    pub last_name: Option<String>,
}

impl CreateAccount {
    /// Input with just a username and password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: Password) -> Self {
        Self {
            username: username.into(),
            password,
            first_name: None,
            last_name: None,
        }
    }
}

/// Role creation input.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRole {
    /// Role name, at most 50 characters.
    #[validate(
        length(min = 1, max = 50),
        custom(function = "not_blank")
    )]
    pub name: String,
}

impl CreateRole {
    /// Input for a role name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Result of a create, noting whether it was admitted as a bootstrap.
#[derive(Debug, Clone)]
pub struct Created<T> {
    /// The stored row.
    pub record: T,
    /// Whether the create bypassed the guard chain.
    pub bootstrap: bool,
}

/// A caller admitted to create one row of `T`.
///
/// For a bootstrap admission this holds the collection lock until the
/// create finishes.
#[must_use = "an admission does nothing until passed to a create"]
pub struct Admission<'a, T> {
    ctx: RequestContext,
    _held: Option<MutexGuard<'a, ()>>,
    _row: PhantomData<fn() -> T>,
}

impl<T> Admission<'_, T> {
    /// Whether the create bypasses the guard chain.
    #[must_use]
    pub const fn is_bootstrap(&self) -> bool {
        self.ctx.is_bootstrap()
    }
}

impl<T> std::fmt::Debug for Admission<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Admission")
            .field("bootstrap", &self.is_bootstrap())
            .finish_non_exhaustive()
    }
}

/// Which bootstrap paths are open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupStatus {
    /// Whether the next account create would be a bootstrap.
    pub accounts_empty: bool,
    /// Whether the next role create would be a bootstrap.
    pub roles_empty: bool,
    /// Number of accounts.
    pub account_count: usize,
    /// Number of roles.
    pub role_count: usize,
}

/// Wraps account and role creation with the empty-table bootstrap rule.
pub struct BootstrapController {
    store: Arc<CredentialStore>,
    admin_chain: Arc<GuardChain>,
    admin_role: String,
    bootstrap_role_id: RoleId,
    password_policy: PasswordPolicy,
    accounts_lock: Mutex<()>,
    roles_lock: Mutex<()>,
}

impl BootstrapController {
    /// Create a controller.
    ///
    /// `admin_chain` guards populated-path creates.
    #[must_use]
    pub fn new(
        store: Arc<CredentialStore>,
        admin_chain: Arc<GuardChain>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            store,
            admin_chain,
            admin_role: config.admin_role.clone(),
            bootstrap_role_id: RoleId::new(config.bootstrap_role_id),
            password_policy: config.password_policy,
            accounts_lock: Mutex::new(()),
            roles_lock: Mutex::new(()),
        }
    }

    /// Role id bound to the first account.
    #[must_use]
    pub const fn bootstrap_role_id(&self) -> RoleId {
        self.bootstrap_role_id
    }

    /// Decide whether a caller may create an account.
    ///
    /// With no accounts stored the caller is admitted as a bootstrap and the
    /// account lock stays held by the returned admission. Otherwise the
    /// admin guard chain runs.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` / `Forbidden` from the guard chain (populated table).
    pub async fn admit_account(
        &self,
        ctx: RequestContext,
    ) -> Result<Admission<'_, Account>, AuthError> {
        self.admit(&self.accounts_lock, Collection::Accounts, ctx)
            .await
    }

    /// Decide whether a caller may create a role. See [`Self::admit_account`].
    ///
    /// # Errors
    ///
    /// `Unauthenticated` / `Forbidden` from the guard chain (populated table).
    pub async fn admit_role(&self, ctx: RequestContext) -> Result<Admission<'_, Role>, AuthError> {
        self.admit(&self.roles_lock, Collection::Roles, ctx).await
    }

    async fn admit<'a, T>(
        &'a self,
        lock: &'a Mutex<()>,
        collection: Collection,
        ctx: RequestContext,
    ) -> Result<Admission<'a, T>, AuthError> {
        let held = lock.lock().await;
        let bootstrap = match collection {
            Collection::Accounts => self.store.accounts_empty(),
            Collection::Roles => self.store.roles_empty(),
        };

        let ctx = if bootstrap {
            tracing::info!(collection = %collection, "Table is empty, admitting bootstrap create");
            ctx.into_bootstrap()
        } else {
            ctx
        };
        let ctx = self.admin_chain.run(ctx)?;

        Ok(Admission {
            ctx,
            // Populated-path creates release the lock immediately
            _held: bootstrap.then_some(held),
            _row: PhantomData,
        })
    }

    /// Create an account, admitting it without a token if no accounts exist.
    ///
    /// Shorthand for [`Self::admit_account`] followed by
    /// [`Self::create_account`].
    ///
    /// # Errors
    ///
    /// See both steps.
    pub async fn create_account_with_bootstrap(
        &self,
        ctx: RequestContext,
        input: CreateAccount,
    ) -> Result<Created<Account>, AuthError> {
        let admission = self.admit_account(ctx).await?;
        self.create_account(admission, input).await
    }

    /// Create an admitted account.
    ///
    /// A bootstrap create also binds the account to the bootstrap role. If
    /// that binding fails the account is deleted again.
    ///
    /// # Errors
    ///
    /// - `Validation` for malformed input
    /// - `Conflict` for a taken username
    /// - `BootstrapRollback` if the bootstrap role could not be bound
    pub async fn create_account(
        &self,
        admission: Admission<'_, Account>,
        input: CreateAccount,
    ) -> Result<Created<Account>, AuthError> {
        let new = self.prepare_account(input).await?;
        let account = self.store.insert_account(new)?;

        let created = if admission.is_bootstrap() {
            self.bind_bootstrap_role(account)
        } else {
            tracing::info!(account_id = %account.id, username = %account.username, "Account created");
            Ok(Created {
                record: account,
                bootstrap: false,
            })
        };

        drop(admission);
        created
    }

    fn bind_bootstrap_role(&self, account: Account) -> Result<Created<Account>, AuthError> {
        match self
            .store
            .insert_assignment(account.id, self.bootstrap_role_id)
        {
            Ok(_) => {
                tracing::info!(
                    account_id = %account.id,
                    username = %account.username,
                    role_id = %self.bootstrap_role_id,
                    "Initial account created via bootstrap"
                );
                Ok(Created {
                    record: account,
                    bootstrap: true,
                })
            }
            Err(cause) => Err(self.roll_back_account(&account, &cause)),
        }
    }

    /// Create a role, admitting it without a token if no roles exist.
    ///
    /// Shorthand for [`Self::admit_role`] followed by [`Self::create_role`].
    ///
    /// # Errors
    ///
    /// See both steps.
    pub async fn create_role_with_bootstrap(
        &self,
        ctx: RequestContext,
        input: CreateRole,
    ) -> Result<Created<Role>, AuthError> {
        let admission = self.admit_role(ctx).await?;
        self.create_role(admission, input)
    }

    /// Create an admitted role.
    ///
    /// While the role table is empty the only accepted name is the admin
    /// role (compared case-insensitively).
    ///
    /// # Errors
    ///
    /// - `Validation` for malformed input or a wrong first-role name
    /// - `Conflict` for a taken name
    pub fn create_role(
        &self,
        admission: Admission<'_, Role>,
        input: CreateRole,
    ) -> Result<Created<Role>, AuthError> {
        let bootstrap = admission.is_bootstrap();

        input.validate()?;
        let name = validate_role_name(&input.name)?;

        if bootstrap && name.to_lowercase() != self.admin_role.to_lowercase() {
            return Err(AuthError::Validation(format!(
                "The first role must be named '{}'",
                self.admin_role
            )));
        }

        let role = self.store.insert_role(&name)?;

        if bootstrap {
            tracing::info!(role_id = %role.id, name = %role.name, "Initial role created via bootstrap");
            if role.id != self.bootstrap_role_id {
                tracing::warn!(
                    role_id = %role.id,
                    bootstrap_role_id = %self.bootstrap_role_id,
                    "Admin role did not receive the bootstrap role id; account bootstrap will fail until auth.bootstrapRoleId matches"
                );
            }
        } else {
            tracing::info!(role_id = %role.id, name = %role.name, "Role created");
        }

        drop(admission);
        Ok(Created {
            record: role,
            bootstrap,
        })
    }

    /// Create the admin role (if no roles exist) and the first account.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if accounts already exist, otherwise any error of
    /// the two bootstrap creates.
    pub async fn bootstrap_admin(
        &self,
        username: &str,
        password: Password,
    ) -> Result<Account, AuthError> {
        if !self.store.accounts_empty() {
            return Err(AuthError::Conflict(
                "Accounts already exist; bootstrap is closed".to_string(),
            ));
        }

        if self.store.roles_empty() {
            self.create_role_with_bootstrap(
                RequestContext::default(),
                CreateRole::new(self.admin_role.clone()),
            )
            .await?;
        }

        let created = self
            .create_account_with_bootstrap(
                RequestContext::default(),
                CreateAccount::new(username, password),
            )
            .await?;

        if !created.bootstrap {
            // Another writer populated the table between the check and the lock
            return Err(AuthError::Conflict(
                "Accounts already exist; bootstrap is closed".to_string(),
            ));
        }
        Ok(created.record)
    }

    /// Auto-setup from environment variables.
    ///
    /// Uses `ROLEGATE_ADMIN_USERNAME` and `ROLEGATE_ADMIN_PASSWORD` when both
    /// are set and no accounts exist.
    ///
    /// # Errors
    ///
    /// Returns error if the bootstrap creates fail.
    pub async fn auto_setup_from_env(&self) -> Result<Option<Account>, AuthError> {
        if !self.store.accounts_empty() {
            return Ok(None);
        }

        let username = match std::env::var("ROLEGATE_ADMIN_USERNAME") {
            Ok(u) if !u.is_empty() => u,
            _ => return Ok(None),
        };

        let password = match std::env::var("ROLEGATE_ADMIN_PASSWORD") {
            Ok(p) if !p.is_empty() => Password::new(p),
            _ => return Ok(None),
        };

        let admin = self.bootstrap_admin(&username, password).await?;

        tracing::info!(
            username = %admin.username,
            "Admin account created from environment variables"
        );

        Ok(Some(admin))
    }

    /// Current bootstrap state of both collections.
    #[must_use]
    pub fn status(&self) -> SetupStatus {
        SetupStatus {
            accounts_empty: self.store.accounts_empty(),
            roles_empty: self.store.roles_empty(),
            account_count: self.store.count_accounts(),
            role_count: self.store.count_roles(),
        }
    }

    async fn prepare_account(&self, input: CreateAccount) -> Result<NewAccount, AuthError> {
        input.validate()?;
        let username = validate_username(&input.username)?;
        validate_password(&input.password, &self.password_policy)?;
        let first_name = validate_person_name("firstName", input.first_name.as_deref())?;
        let last_name = validate_person_name("lastName", input.last_name.as_deref())?;

        Ok(NewAccount {
            username,
            password_hash: hash_password_blocking(input.password).await?,
            first_name,
            last_name,
        })
    }

    fn roll_back_account(&self, account: &Account, cause: &AuthError) -> AuthError {
        tracing::error!(
            account_id = %account.id,
            role_id = %self.bootstrap_role_id,
            error = %cause,
            "Bootstrap role assignment failed, deleting account"
        );

        match self.store.delete_account(account.id) {
            Ok(_) => AuthError::BootstrapRollback(format!(
                "could not assign role {} to the first account: {cause}",
                self.bootstrap_role_id
            )),
            Err(delete_err) => {
                tracing::error!(
                    account_id = %account.id,
                    error = %delete_err,
                    "Compensating delete failed; account remains without roles"
                );
                AuthError::BootstrapRollback(format!(
                    "could not assign role {} to the first account: {cause}; compensating delete failed: {delete_err}",
                    self.bootstrap_role_id
                ))
            }
        }
    }
}

impl std::fmt::Debug for BootstrapController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapController")
            .field("admin_role", &self.admin_role)
            .field("bootstrap_role_id", &self.bootstrap_role_id)
            .finish_non_exhaustive()
    }
}

/// Generate a random alphanumeric password that satisfies `policy`.
#[must_use]
pub fn generate_password(length: usize, policy: &PasswordPolicy) -> Password {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let length = length.max(policy.min_length);
    let mut rng = rand::thread_rng();

    loop {
        let candidate: String = (0..length)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect();
        let password = Password::new(candidate);
        if validate_password(&password, policy).is_ok() {
            return password;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenCodec;
    use rolegate_core::AccountId;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<CredentialStore>,
        codec: Arc<TokenCodec>,
        controller: Arc<BootstrapController>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CredentialStore::open(dir.path()).unwrap());
        let codec = Arc::new(TokenCodec::new(
            &TokenCodec::generate_secret(),
            Duration::from_secs(3600),
        ));
        let config = AuthConfig::default();
        let chain = Arc::new(GuardChain::with_role(codec.clone(), &config.admin_role));
        let controller = Arc::new(BootstrapController::new(store.clone(), chain, &config));
        Fixture {
            _dir: dir,
            store,
            codec,
            controller,
        }
    }

    fn ctx_with_roles(codec: &TokenCodec, roles: &[&str]) -> RequestContext {
        let issued = codec
            .issue(
                AccountId::new(1),
                roles.iter().map(ToString::to_string).collect(),
            )
            .unwrap();
        RequestContext::new(Some(format!("Bearer {}", issued.token)))
    }

    fn input(username: &str) -> CreateAccount {
        CreateAccount::new(username, Password::from("Str0ngPass"))
    }

    #[tokio::test]
    async fn test_first_role_must_be_admin() {
        let f = fixture();

        let result = f
            .controller
            .create_role_with_bootstrap(RequestContext::default(), CreateRole::new("member"))
            .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
        assert!(f.store.roles_empty());

        let created = f
            .controller
            .create_role_with_bootstrap(RequestContext::default(), CreateRole::new("Admin"))
            .await
            .unwrap();
        assert!(created.bootstrap);
        assert_eq!(created.record.id, RoleId::new(1));
        assert_eq!(created.record.name, "Admin");
    }

    #[tokio::test]
    async fn test_role_bootstrap_closes_after_first_row() {
        let f = fixture();
        f.controller
            .create_role_with_bootstrap(RequestContext::default(), CreateRole::new("admin"))
            .await
            .unwrap();

        let anonymous = f
            .controller
            .create_role_with_bootstrap(RequestContext::default(), CreateRole::new("member"))
            .await;
        assert!(matches!(anonymous, Err(AuthError::Unauthenticated)));

        let as_user = f
            .controller
            .create_role_with_bootstrap(
                ctx_with_roles(&f.codec, &["member"]),
                CreateRole::new("member"),
            )
            .await;
        assert!(matches!(as_user, Err(AuthError::Forbidden(_))));

        let as_admin = f
            .controller
            .create_role_with_bootstrap(
                ctx_with_roles(&f.codec, &["Admin"]),
                CreateRole::new("member"),
            )
            .await
            .unwrap();
        assert!(!as_admin.bootstrap);
    }

    #[tokio::test]
    async fn test_account_bootstrap_single_shot() {
        let f = fixture();
        f.store.insert_role("admin").unwrap();

        let created = f
            .controller
            .create_account_with_bootstrap(RequestContext::default(), input("alice"))
            .await
            .unwrap();
        assert!(created.bootstrap);
        let alice = created.record;
        assert!(f.store.find_assignment(alice.id, RoleId::new(1)).unwrap().is_some());

        let second = f
            .controller
            .create_account_with_bootstrap(RequestContext::default(), input("bob"))
            .await;
        assert!(matches!(second, Err(AuthError::Unauthenticated)));
        assert!(f.store.find_by_username("bob").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_account_bootstrap_rolls_back_without_role() {
        let f = fixture();

        let result = f
            .controller
            .create_account_with_bootstrap(RequestContext::default(), input("alice"))
            .await;
        assert!(matches!(result, Err(AuthError::BootstrapRollback(_))));
        assert!(f.store.find_by_username("alice").unwrap().is_none());
        assert!(f.store.accounts_empty());
    }

    #[tokio::test]
    async fn test_admission_precedes_validation() {
        let f = fixture();
        f.store.insert_role("admin").unwrap();
        f.controller
            .create_account_with_bootstrap(RequestContext::default(), input("root"))
            .await
            .unwrap();

        let result = f
            .controller
            .create_account_with_bootstrap(RequestContext::default(), input("not valid!"))
            .await;
        assert!(matches!(result, Err(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_bootstrap_admission_holds_lock() {
        let f = fixture();
        f.store.insert_role("admin").unwrap();

        let first = f
            .controller
            .admit_account(RequestContext::default())
            .await
            .unwrap();
        assert!(first.is_bootstrap());

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            f.controller.admit_account(RequestContext::default()),
        )
        .await;
        assert!(blocked.is_err());

        f.controller
            .create_account(first, input("root"))
            .await
            .unwrap();

        let after = f.controller.admit_account(RequestContext::default()).await;
        assert!(matches!(after, Err(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_populated_admission_rejects_before_input() {
        let f = fixture();
        f.store.insert_role("admin").unwrap();

        let anonymous = f.controller.admit_role(RequestContext::default()).await;
        assert!(matches!(anonymous, Err(AuthError::Unauthenticated)));

        let admitted = f
            .controller
            .admit_role(ctx_with_roles(&f.codec, &["admin"]))
            .await
            .unwrap();
        assert!(!admitted.is_bootstrap());
        let result = f.controller.create_role(admitted, CreateRole::new("   "));
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn test_bootstrap_validates_input() {
        let f = fixture();
        f.store.insert_role("admin").unwrap();

        let weak = CreateAccount::new("alice", Password::from("weak"));
        let result = f
            .controller
            .create_account_with_bootstrap(RequestContext::default(), weak)
            .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
        assert!(f.store.accounts_empty());
    }

    #[tokio::test]
    async fn test_populated_create_with_admin_token() {
        let f = fixture();
        f.store.insert_role("admin").unwrap();
        f.controller
            .create_account_with_bootstrap(RequestContext::default(), input("root"))
            .await
            .unwrap();

        let created = f
            .controller
            .create_account_with_bootstrap(ctx_with_roles(&f.codec, &["admin"]), input("bob"))
            .await
            .unwrap();
        assert!(!created.bootstrap);
        assert!(f.store.list_roles_for_account(created.record.id).unwrap().is_empty());

        let duplicate = f
            .controller
            .create_account_with_bootstrap(ctx_with_roles(&f.codec, &["admin"]), input("bob"))
            .await;
        assert!(matches!(duplicate, Err(AuthError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_emptied_table_reopens_bootstrap() {
        let f = fixture();
        f.store.insert_role("admin").unwrap();
        let first = f
            .controller
            .create_account_with_bootstrap(RequestContext::default(), input("root"))
            .await
            .unwrap();
        f.store.delete_account(first.record.id).unwrap();

        let again = f
            .controller
            .create_account_with_bootstrap(RequestContext::default(), input("root2"))
            .await
            .unwrap();
        assert!(again.bootstrap);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_first_creates_admit_one() {
        let f = fixture();
        f.store.insert_role("admin").unwrap();

        let a = {
            let controller = f.controller.clone();
            tokio::spawn(async move {
                controller
                    .create_account_with_bootstrap(RequestContext::default(), input("alice"))
                    .await
            })
        };
        let b = {
            let controller = f.controller.clone();
            tokio::spawn(async move {
                controller
                    .create_account_with_bootstrap(RequestContext::default(), input("bob"))
                    .await
            })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let admitted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(admitted, 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(AuthError::Unauthenticated)))
        );
        assert_eq!(f.store.count_accounts(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_admin() {
        let f = fixture();
        let admin = f
            .controller
            .bootstrap_admin("root", Password::from("Str0ngPass"))
            .await
            .unwrap();

        let roles = f.store.list_roles_for_account(admin.id).unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].name, "admin");

        let again = f
            .controller
            .bootstrap_admin("other", Password::from("Str0ngPass"))
            .await;
        assert!(matches!(again, Err(AuthError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_status() {
        let f = fixture();
        let status = f.controller.status();
        assert!(status.accounts_empty);
        assert!(status.roles_empty);

        f.store.insert_role("admin").unwrap();
        let status = f.controller.status();
        assert!(!status.roles_empty);
        assert_eq!(status.role_count, 1);
    }

    #[test]
    fn test_generate_password() {
        let policy = PasswordPolicy::default();
        for _ in 0..20 {
            let password = generate_password(16, &policy);
            assert_eq!(password.char_count(), 16);
            assert!(validate_password(&password, &policy).is_ok());
        }
        assert_eq!(generate_password(2, &policy).char_count(), 8);
    }
}
