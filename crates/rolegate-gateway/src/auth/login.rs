//! Credential verification and token issuance.

use chrono::{DateTime, Utc};
use rolegate_core::config::PasswordPolicy;
use rolegate_core::validation::{validate_password, validate_username};
use rolegate_core::{AccountId, Password};
use serde::{Deserialize, Serialize};

use super::AuthError;
use super::jwt::TokenCodec;
use super::password::{verify_dummy, verify_password};
use super::store::CredentialStore;

/// Login request body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Username.
    pub username: String,
    /// Plaintext password.
    pub password: Password,
}

/// Successful login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Signed bearer token.
    pub token: String,
    /// Role names embedded in the token.
    pub roles: Vec<String>,
    /// Authenticated account.
    pub account_id: AccountId,
    /// Token expiry.
    pub expires_at: DateTime<Utc>,
}

/// Verify a username and password and issue a token.
///
/// Input is validated before the store is touched. An unknown username, a
/// disabled account and a wrong password all fail with the same
/// `InvalidCredentials`.
///
/// # Errors
///
/// - `Validation` for malformed input
/// - `InvalidCredentials` for any credential mismatch
/// - `Storage` / `Config` for server-side failures
pub fn authenticate(
    store: &CredentialStore,
    codec: &TokenCodec,
    policy: &PasswordPolicy,
    username: &str,
    password: &Password,
) -> Result<LoginResponse, AuthError> {
    let username = validate_username(username)?;
    validate_password(password, policy)?;

    let Some(account) = store.find_by_username(&username)? else {
        verify_dummy(password);
        tracing::info!(username = %username, reason = "unknown_user", "Login failed");
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_password(password, &account.password_hash) {
        tracing::info!(account_id = %account.id, reason = "bad_password", "Login failed");
        return Err(AuthError::InvalidCredentials);
    }

    if !account.active {
        tracing::info!(account_id = %account.id, reason = "disabled", "Login failed");
        return Err(AuthError::InvalidCredentials);
    }

    let roles: Vec<String> = store
        .list_roles_for_account(account.id)?
        .into_iter()
        .map(|role| role.name)
        .collect();

    let issued = codec
        .issue(account.id, roles.clone())
        .map_err(|e| AuthError::Config(format!("Token signing failed: {e}")))?;

    tracing::info!(account_id = %account.id, role_count = roles.len(), "Login succeeded");

    Ok(LoginResponse {
        token: issued.token,
        roles,
        account_id: account.id,
        expires_at: issued.expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::auth::store::NewAccount;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: CredentialStore,
        codec: TokenCodec,
        policy: PasswordPolicy,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open(dir.path()).unwrap();
        let account = store
            .insert_account(NewAccount {
                username: "root".to_string(),
                password_hash: hash_password(&Password::from("Str0ngPass")).unwrap(),
                first_name: None,
                last_name: None,
            })
            .unwrap();
        let admin = store.insert_role("Admin").unwrap();
        store.insert_assignment(account.id, admin.id).unwrap();

        Fixture {
            _dir: dir,
            store,
            codec: TokenCodec::new(&TokenCodec::generate_secret(), Duration::from_secs(3600)),
            policy: PasswordPolicy::default(),
        }
    }

    fn login(f: &Fixture, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        authenticate(&f.store, &f.codec, &f.policy, username, &Password::from(password))
    }

    #[test]
    fn test_login_success_embeds_roles() {
        let f = fixture();
        let response = login(&f, "root", "Str0ngPass").unwrap();
        assert_eq!(response.roles, vec!["Admin".to_string()]);

        let claims = f.codec.verify(&response.token).unwrap();
        assert_eq!(claims.roles, vec!["Admin".to_string()]);
        assert_eq!(claims.account_id().unwrap(), response.account_id);
    }

    #[test]
    fn test_failures_are_undifferentiated() {
        let f = fixture();
        let unknown = login(&f, "nobody", "Str0ngPass").unwrap_err();
        let wrong = login(&f, "root", "Wr0ngPass").unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn test_disabled_account_rejected() {
        let f = fixture();
        let account = f.store.find_by_username("root").unwrap().unwrap();
        f.store.set_account_active(account.id, false).unwrap();

        assert!(matches!(
            login(&f, "root", "Str0ngPass"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_malformed_input_rejected_before_lookup() {
        let f = fixture();
        assert!(matches!(login(&f, "", "Str0ngPass"), Err(AuthError::Validation(_))));
        assert!(matches!(login(&f, "ro ot", "Str0ngPass"), Err(AuthError::Validation(_))));
        assert!(matches!(login(&f, "root", "short"), Err(AuthError::Validation(_))));
    }

    #[test]
    fn test_roles_are_snapshot() {
        let f = fixture();
        let response = login(&f, "root", "Str0ngPass").unwrap();

        let member = f.store.insert_role("member").unwrap();
        f.store
            .insert_assignment(response.account_id, member.id)
            .unwrap();

        // The earlier token still carries the old role set
        let claims = f.codec.verify(&response.token).unwrap();
        assert_eq!(claims.roles, vec!["Admin".to_string()]);

        let fresh = login(&f, "root", "Str0ngPass").unwrap();
        assert_eq!(fresh.roles, vec!["Admin".to_string(), "member".to_string()]);
    }
}
