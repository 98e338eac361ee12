//! Rolegate CLI - run the gateway and administer its credential store.

mod commands;
mod ui;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use rolegate_core::{Config, IgnoredOverride, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "rolegate")]
#[command(about = "Rolegate - role-gated account and role management gateway")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: ~/.rolegate/rolegate.json)
    #[arg(long, global = true, env = "ROLEGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory override
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show configuration and setup status
    Status,

    /// Account management (operates directly on the data directory)
    Admin {
        #[command(subcommand)]
        action: AdminCommands,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create the admin role and the first account
    Bootstrap {
        /// Username for the first account
        #[arg(long)]
        username: String,

        /// Password (or use --generate-password)
        #[arg(long, conflicts_with = "generate_password")]
        password: Option<String>,

        /// Generate a random password
        #[arg(long)]
        generate_password: bool,
    },

    /// List all accounts
    List,

    /// Reset an account's password
    ResetPassword {
        /// Username of the account
        #[arg(long)]
        username: String,
    },

    /// Enable an account
    Enable {
        /// Username of the account
        #[arg(long)]
        username: String,
    },

    /// Disable an account
    Disable {
        /// Username of the account
        #[arg(long)]
        username: String,
    },

    /// Delete an account
    Delete {
        /// Username of the account to delete
        #[arg(long)]
        username: String,
    },
}

/// Load the config file and apply overrides.
///
/// Overrides that could not be applied are returned rather than logged,
/// since no subscriber is installed yet.
fn load_config(
    path: Option<&Path>,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<(Config, Vec<IgnoredOverride>)> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_default().context("Failed to load default config")?,
    };

    let (mut config, ignored) = config.with_env_overrides();
    if let Some(dir) = data_dir {
        config.storage.data_dir = Some(dir);
    }
    Ok((config, ignored))
}

fn init_logging(verbose: bool, config: &Config) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(false)).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, ignored) = load_config(cli.config.as_deref(), cli.data_dir)?;
    init_logging(cli.verbose, &config);
    for ignored in &ignored {
        tracing::warn!(variable = ignored.variable, value = %ignored.value, "{ignored}");
    }

    match cli.command {
        Commands::Serve { port, bind } => {
            let args = commands::serve::ServeArgs { port, bind };
            commands::run_serve(config, args).await?;
        }

        Commands::Status => {
            commands::run_status(&config, cli.config.as_deref())?;
        }

        Commands::Admin { action } => {
            let action = match action {
                AdminCommands::Bootstrap {
                    username,
                    password,
                    generate_password,
                } => commands::admin::AdminAction::Bootstrap {
                    username,
                    password,
                    generate_password,
                },
                AdminCommands::List => commands::admin::AdminAction::List,
                AdminCommands::ResetPassword { username } => {
                    commands::admin::AdminAction::ResetPassword { username }
                }
                AdminCommands::Enable { username } => {
                    commands::admin::AdminAction::Enable { username }
                }
                AdminCommands::Disable { username } => {
                    commands::admin::AdminAction::Disable { username }
                }
                AdminCommands::Delete { username } => {
                    commands::admin::AdminAction::Delete { username }
                }
            };
            commands::run_admin(&config, action).await?;
        }
    }

    Ok(())
}
