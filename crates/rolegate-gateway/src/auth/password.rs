//! Password hashing with Argon2id.

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rolegate_core::Password;

use super::AuthError;

/// Hash verified against when the account does not exist, so a missing
/// username costs the same as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password(&Password::from("rolegate-dummy-0")).ok());

/// Hash a password using Argon2id with a random salt.
///
/// # Errors
///
/// Returns `Config` if hashing fails.
pub fn hash_password(password: &Password) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.expose().as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Config(format!("Password hashing failed: {e}")))
}

/// Hash on the blocking pool so the async runtime keeps serving requests.
///
/// # Errors
///
/// Returns `Config` if hashing fails, `TaskJoin` if the task is lost.
pub async fn hash_password_blocking(password: Password) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::TaskJoin(e.to_string()))?
}

/// Verify a password against a stored PHC hash.
///
/// The comparison inside argon2 is constant-time. An unparseable hash
/// verifies as `false`.
#[must_use]
pub fn verify_password(password: &Password, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        tracing::warn!("Stored password hash is not a valid PHC string");
        return false;
    };

    Argon2::default()
        .verify_password(password.expose().as_bytes(), &parsed_hash)
        .is_ok()
}

/// Burn one verification against a throwaway hash.
pub(crate) fn verify_dummy(password: &Password) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}
