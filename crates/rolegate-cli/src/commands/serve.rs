//! Serve command - run the gateway server.

use crate::ui;
use anyhow::{Context, Result};
use rolegate_core::Config;
use rolegate_gateway::GatewayBuilder;

/// Serve command arguments.
#[derive(Debug, Clone, Default)]
pub struct ServeArgs {
    /// Port to listen on.
    pub port: Option<u16>,
    /// Bind address.
    pub bind: Option<String>,
}

/// Apply command-line overrides on top of the loaded config.
fn apply_overrides(mut config: Config, args: ServeArgs) -> Config {
    if let Some(port) = args.port {
        config.gateway.port = port;
    }
    if let Some(bind) = args.bind {
        config.gateway.bind_address = bind;
    }
    config
}

/// Run the gateway until Ctrl+C.
///
/// # Errors
///
/// Returns error if the config is invalid or the server fails.
pub async fn run_serve(config: Config, args: ServeArgs) -> Result<()> {
    let config = apply_overrides(config, args);
    config.validate().context("Invalid configuration")?;

    ui::header("Starting Rolegate Gateway");
    ui::kv("Address", &config.gateway.socket_addr());
    ui::kv("Data", &config.data_dir().display().to_string());
    ui::kv("Admin role", &config.auth.admin_role);
    println!();

    let gateway = GatewayBuilder::new()
        .with_config(config)
        .build()
        .context("Failed to build gateway")?;

    let status = gateway.state().auth.bootstrap.status();
    if status.roles_empty || status.accounts_empty {
        ui::warning("Setup is incomplete; the first role and account can be created without a token");
        ui::info("Run 'rolegate admin bootstrap' or set ROLEGATE_ADMIN_USERNAME/ROLEGATE_ADMIN_PASSWORD");
    }

    ui::info("Press Ctrl+C to stop");
    println!();

    gateway.run().await?;
    Ok(())
}
