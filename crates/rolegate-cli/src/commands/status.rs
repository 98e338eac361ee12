//! Status command - show configuration and setup state.

use std::path::Path;

use crate::ui::{self, HealthStatus};
use anyhow::Result;
use rolegate_core::Config;
use rolegate_gateway::auth::{CredentialStore, SetupStatus};

/// Run the status command.
///
/// # Errors
///
/// Returns error only on unexpected output failures; store problems are
/// reported as health checks.
pub fn run_status(config: &Config, config_path: Option<&Path>) -> Result<()> {
    ui::header("Rolegate Status");

    println!();
    ui::info("Configuration");
    let path = config_path.map_or_else(Config::default_path, Path::to_path_buf);
    if path.exists() {
        ui::health_check("Config", HealthStatus::Ok, Some(&path.display().to_string()));
    } else {
        ui::health_check("Config", HealthStatus::Warning, Some("not found, using defaults"));
    }
    match config.validate() {
        Ok(()) => ui::health_check("Validation", HealthStatus::Ok, None),
        Err(e) => ui::health_check("Validation", HealthStatus::Error, Some(&e.to_string())),
    }
    ui::kv("  Address", &config.gateway.socket_addr());
    ui::kv("  Admin role", &config.auth.admin_role);
    ui::kv("  Token TTL", &format!("{}h", config.auth.token_ttl_hours));
    if config.auth.jwt_secret.is_none() {
        ui::health_check(
            "Signing secret",
            HealthStatus::Warning,
            Some("not set, tokens will not survive restarts"),
        );
    }

    println!();
    ui::info("Credential store");
    let data_dir = config.data_dir();
    ui::kv("  Data", &data_dir.display().to_string());

    match read_setup_status(&data_dir) {
        StoreStatus::Missing => {
            ui::health_check("Store", HealthStatus::Unknown, Some("not created yet"));
        }
        StoreStatus::Unavailable(reason) => {
            ui::health_check("Store", HealthStatus::Error, Some(&reason));
            ui::info("  The gateway may be running and holding the store lock");
        }
        StoreStatus::Ready(status) => {
            ui::health_check("Store", HealthStatus::Ok, Some("opened"));
            report_table("Roles", status.roles_empty, status.role_count);
            report_table("Accounts", status.accounts_empty, status.account_count);
            if status.roles_empty || status.accounts_empty {
                ui::info("  Run 'rolegate admin bootstrap --username <name> --generate-password'");
            }
        }
    }

    Ok(())
}

fn report_table(name: &str, empty: bool, count: usize) {
    if empty {
        ui::health_check(name, HealthStatus::Warning, Some("empty, bootstrap open"));
    } else {
        ui::health_check(name, HealthStatus::Ok, Some(&count.to_string()));
    }
}

enum StoreStatus {
    Missing,
    Unavailable(String),
    Ready(SetupStatus),
}

fn read_setup_status(data_dir: &Path) -> StoreStatus {
    if !data_dir.exists() {
        return StoreStatus::Missing;
    }

    match CredentialStore::open(data_dir) {
        Ok(store) => StoreStatus::Ready(SetupStatus {
            accounts_empty: store.accounts_empty(),
            roles_empty: store.roles_empty(),
            account_count: store.count_accounts(),
            role_count: store.count_roles(),
        }),
        Err(e) => StoreStatus::Unavailable(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_store() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            read_setup_status(&temp_dir.path().join("absent")),
            StoreStatus::Missing
        ));
    }

    #[test]
    fn test_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        let StoreStatus::Ready(status) = read_setup_status(temp_dir.path()) else {
            panic!("store should open");
        };
        assert!(status.accounts_empty);
        assert!(status.roles_empty);
    }
}
