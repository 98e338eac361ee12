//! Offline account management commands.
//!
//! These open the credential store directly, so the gateway must not be
//! running against the same data directory.

use anyhow::{Context, Result, anyhow, bail};
use rolegate_core::{Config, Password};
use rolegate_gateway::auth::bootstrap::generate_password;
use rolegate_gateway::auth::{Account, AuthState, CredentialStore, TokenCodec, hash_password};

use crate::ui;

const GENERATED_PASSWORD_LENGTH: usize = 16;

/// Admin actions.
pub enum AdminAction {
    /// Create the admin role and the first account.
    Bootstrap {
        /// Username for the first account.
        username: String,
        /// Explicit password.
        password: Option<String>,
        /// Generate a random password instead.
        generate_password: bool,
    },
    /// List all accounts.
    List,
    /// Reset an account's password.
    ResetPassword {
        /// Target username.
        username: String,
    },
    /// Enable an account.
    Enable {
        /// Target username.
        username: String,
    },
    /// Disable an account.
    Disable {
        /// Target username.
        username: String,
    },
    /// Delete an account.
    Delete {
        /// Target username.
        username: String,
    },
}

/// Run an admin command.
///
/// # Errors
///
/// Returns error if the store cannot be opened or the operation fails.
pub async fn run_admin(config: &Config, action: AdminAction) -> Result<()> {
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let store = CredentialStore::open(&data_dir)
        .map_err(|e| anyhow!("Failed to open credential store: {e}"))?;

    // No tokens are issued offline, so a throwaway signing key is enough
    let codec = TokenCodec::new(&TokenCodec::generate_secret(), config.auth.token_ttl());
    let state = AuthState::new(config.auth.clone(), codec, store);

    match action {
        AdminAction::Bootstrap {
            username,
            password,
            generate_password,
        } => bootstrap(&state, &username, password, generate_password).await?,
        AdminAction::List => list_accounts(&state)?,
        AdminAction::ResetPassword { username } => reset_password(&state, &username)?,
        AdminAction::Enable { username } => set_active(&state.store, &username, true)?,
        AdminAction::Disable { username } => set_active(&state.store, &username, false)?,
        AdminAction::Delete { username } => {
            delete_account(&state.store, &config.auth.admin_role, &username)?;
        }
    }

    state
        .store
        .flush()
        .map_err(|e| anyhow!("Failed to flush store: {e}"))?;
    Ok(())
}

async fn bootstrap(
    state: &AuthState,
    username: &str,
    password: Option<String>,
    generate: bool,
) -> Result<()> {
    let password = if generate {
        generate_password(GENERATED_PASSWORD_LENGTH, &state.config.password_policy)
    } else {
        password
            .map(Password::from)
            .ok_or_else(|| anyhow!("Password required. Use --password or --generate-password"))?
    };

    let account = state
        .bootstrap
        .bootstrap_admin(username, password.clone())
        .await
        .map_err(|e| anyhow!("Bootstrap failed: {e}"))?;

    ui::success(&format!(
        "Created account '{}' with role '{}'",
        account.username, state.config.admin_role
    ));
    if generate {
        ui::success(&format!("Generated password: {}", password.expose()));
    }

    Ok(())
}

fn list_accounts(state: &AuthState) -> Result<()> {
    let accounts = state
        .store
        .list_accounts()
        .map_err(|e| anyhow!("Failed to list accounts: {e}"))?;

    if accounts.is_empty() {
        ui::info("No accounts configured.");
        ui::info("Run 'rolegate admin bootstrap --username admin --generate-password' to create one.");
        return Ok(());
    }

    ui::info(&format!("Accounts ({}):", accounts.len()));
    println!();
    println!(
        "{:<6} {:<20} {:<24} {:<8} {:<20}",
        "ID", "USERNAME", "ROLES", "ACTIVE", "CREATED"
    );
    println!("{}", "-".repeat(80));

    for account in accounts {
        let roles = state
            .store
            .list_roles_for_account(account.id)
            .map_err(|e| anyhow!("Failed to read roles: {e}"))?
            .into_iter()
            .map(|role| role.name)
            .collect::<Vec<_>>()
            .join(",");
        let active = if account.active { "yes" } else { "no" };
        println!(
            "{:<6} {:<20} {:<24} {:<8} {:<20}",
            account.id.get(),
            account.username,
            roles,
            active,
            account.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

fn find_account(store: &CredentialStore, username: &str) -> Result<Account> {
    store
        .find_by_username(username)
        .map_err(|e| anyhow!("Failed to find account: {e}"))?
        .ok_or_else(|| anyhow!("Account not found: {username}"))
}

fn reset_password(state: &AuthState, username: &str) -> Result<()> {
    let account = find_account(&state.store, username)?;
    let password = generate_password(GENERATED_PASSWORD_LENGTH, &state.config.password_policy);

    let hash = hash_password(&password).map_err(|e| anyhow!("Failed to hash password: {e}"))?;
    state
        .store
        .update_password_hash(account.id, hash)
        .map_err(|e| anyhow!("Failed to update account: {e}"))?;

    ui::success(&format!("Password reset for account '{username}'"));
    ui::success(&format!("New password: {}", password.expose()));
    Ok(())
}

fn set_active(store: &CredentialStore, username: &str, active: bool) -> Result<()> {
    let account = find_account(store, username)?;
    store
        .set_account_active(account.id, active)
        .map_err(|e| anyhow!("Failed to update account: {e}"))?;

    let status = if active { "enabled" } else { "disabled" };
    ui::success(&format!("Account '{username}' {status}"));
    Ok(())
}

/// Whether `account` is the only active account holding `admin_role`.
fn is_last_active_admin(
    store: &CredentialStore,
    admin_role: &str,
    account: &Account,
) -> Result<bool> {
    let Some(role) = store
        .find_role_by_name(admin_role)
        .map_err(|e| anyhow!("Failed to read roles: {e}"))?
    else {
        return Ok(false);
    };

    let holders = store
        .list_accounts_with_role(role.id)
        .map_err(|e| anyhow!("Failed to read assignments: {e}"))?;

    let holds_role = holders.iter().any(|holder| holder.id == account.id);
    let active_holders = holders.iter().filter(|holder| holder.active).count();

    Ok(holds_role && account.active && active_holders <= 1)
}

fn delete_account(store: &CredentialStore, admin_role: &str, username: &str) -> Result<()> {
    let account = find_account(store, username)?;

    if is_last_active_admin(store, admin_role, &account)? {
        bail!("Cannot delete the last active '{admin_role}' account");
    }

    store
        .delete_account(account.id)
        .map_err(|e| anyhow!("Failed to delete account: {e}"))?;

    ui::success(&format!("Deleted account '{username}'"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolegate_gateway::auth::NewAccount;
    use tempfile::TempDir;

    fn add_account(store: &CredentialStore, username: &str) -> Account {
        store
            .insert_account(NewAccount {
                username: username.to_string(),
                password_hash: "$argon2id$placeholder".to_string(),
                first_name: None,
                last_name: None,
            })
            .unwrap()
    }

    #[test]
    fn test_last_admin_cannot_be_deleted() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::open(temp_dir.path()).unwrap();
        let admin = store.insert_role("admin").unwrap();
        let root = add_account(&store, "root");
        store.insert_assignment(root.id, admin.id).unwrap();

        assert!(delete_account(&store, "admin", "root").is_err());
        assert!(store.get_account(root.id).unwrap().is_some());

        let second = add_account(&store, "second");
        store.insert_assignment(second.id, admin.id).unwrap();
        delete_account(&store, "Admin", "root").unwrap();
        assert!(store.get_account(root.id).unwrap().is_none());
    }

    #[test]
    fn test_disabled_admins_do_not_count() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::open(temp_dir.path()).unwrap();
        let admin = store.insert_role("admin").unwrap();
        let root = add_account(&store, "root");
        let spare = add_account(&store, "spare");
        store.insert_assignment(root.id, admin.id).unwrap();
        store.insert_assignment(spare.id, admin.id).unwrap();
        store.set_account_active(spare.id, false).unwrap();

        assert!(delete_account(&store, "admin", "root").is_err());
        // A disabled holder is never the last active one
        delete_account(&store, "admin", "spare").unwrap();
    }

    #[test]
    fn test_non_admin_deletable() {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::open(temp_dir.path()).unwrap();
        add_account(&store, "bob");
        delete_account(&store, "admin", "bob").unwrap();
        assert!(delete_account(&store, "admin", "bob").is_err());
    }

    #[tokio::test]
    async fn test_bootstrap_then_toggle() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.data_dir = Some(temp_dir.path().to_path_buf());

        run_admin(
            &config,
            AdminAction::Bootstrap {
                username: "root".to_string(),
                password: Some("Str0ngPass".to_string()),
                generate_password: false,
            },
        )
        .await
        .unwrap();

        run_admin(
            &config,
            AdminAction::Disable {
                username: "root".to_string(),
            },
        )
        .await
        .unwrap();

        let store = CredentialStore::open(temp_dir.path()).unwrap();
        let root = store.find_by_username("root").unwrap().unwrap();
        assert!(!root.active);
        let roles = store.list_roles_for_account(root.id).unwrap();
        assert_eq!(roles[0].name, "admin");
    }
}
