//! Configuration loading and validation.
//!
//! Config is JSON5 so operators can comment it.
//! Config location: `~/.rolegate/rolegate.json`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// An environment override whose value could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredOverride {
    /// Variable name.
    pub variable: &'static str,
    /// Raw value that was rejected.
    pub value: String,
}

impl std::fmt::Display for IgnoredOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ignoring invalid {}={:?}", self.variable, self.value)
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP gateway configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a path.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment variable overrides.
    ///
    /// `ROLEGATE_JWT_SECRET`, `ROLEGATE_PORT` and `ROLEGATE_DATA_DIR` take
    /// precedence over the file. Values that cannot be applied are returned
    /// so the caller can report them once logging is up.
    #[must_use]
    pub fn with_env_overrides(self) -> (Self, Vec<IgnoredOverride>) {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup` instead of the process
    /// environment.
    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> (Self, Vec<IgnoredOverride>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut ignored = Vec::new();

        if let Some(secret) = lookup("ROLEGATE_JWT_SECRET").filter(|s| !s.is_empty()) {
            self.auth.jwt_secret = Some(secret);
        }

        if let Some(port) = lookup("ROLEGATE_PORT") {
            match port.parse() {
                Ok(port) => self.gateway.port = port,
                Err(_) => ignored.push(IgnoredOverride {
                    variable: "ROLEGATE_PORT",
                    value: port,
                }),
            }
        }

        if let Some(dir) = lookup("ROLEGATE_DATA_DIR").filter(|d| !d.is_empty()) {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }

        (self, ignored)
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("rolegate.json")
    }

    /// Get the Rolegate state directory.
    ///
    /// Uses `ROLEGATE_STATE_DIR` env var if set, otherwise `~/.rolegate`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("ROLEGATE_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".rolegate")
        } else {
            PathBuf::from(".rolegate")
        }
    }

    /// Resolve the data directory, falling back to `<state dir>/data`.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("data"))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::Validation(
                "Gateway port cannot be 0".to_string(),
            ));
        }

        self.auth.validate()
    }
}

/// Gateway server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address to bind to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Enable CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Allowed CORS origins. Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            cors: true,
            cors_origins: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Socket address string for binding.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

const fn default_port() -> u16 {
    3000
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

const fn default_true() -> bool {
    true
}

/// Default access token lifetime in hours.
const DEFAULT_TOKEN_TTL_HOURS: u64 = 4;
/// Longest accepted access token lifetime in hours (one leap year).
pub const MAX_TOKEN_TTL_HOURS: u64 = 24 * 366;
/// Default login attempts allowed per username per minute.
const DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE: u32 = 10;
/// Role id the first account is bound to during account bootstrap.
pub const DEFAULT_BOOTSTRAP_ROLE_ID: u64 = 1;
/// Name the first role must carry during role bootstrap.
pub const DEFAULT_ADMIN_ROLE: &str = "admin";

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Token signing secret (hex-encoded). Generated at startup if not set.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Access token lifetime in hours.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_hours: u64,

    /// Role required for privileged mutations; also the only name accepted
    /// for the first role.
    #[serde(default = "default_admin_role")]
    pub admin_role: String,

    /// Role id assigned to the first account.
    #[serde(default = "default_bootstrap_role_id")]
    pub bootstrap_role_id: u64,

    /// Login attempts allowed per username per minute.
    #[serde(default = "default_login_attempts")]
    pub login_attempts_per_minute: u32,

    /// Password strength policy.
    #[serde(default)]
    pub password_policy: PasswordPolicy,
}

fn default_token_ttl() -> u64 {
    DEFAULT_TOKEN_TTL_HOURS
}

fn default_admin_role() -> String {
    DEFAULT_ADMIN_ROLE.to_string()
}

const fn default_bootstrap_role_id() -> u64 {
    DEFAULT_BOOTSTRAP_ROLE_ID
}

const fn default_login_attempts() -> u32 {
    DEFAULT_LOGIN_ATTEMPTS_PER_MINUTE
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_hours: default_token_ttl(),
            admin_role: default_admin_role(),
            bootstrap_role_id: default_bootstrap_role_id(),
            login_attempts_per_minute: default_login_attempts(),
            password_policy: PasswordPolicy::default(),
        }
    }
}

impl AuthConfig {
    /// Create a new auth config builder.
    #[must_use]
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Get token lifetime as Duration.
    #[must_use]
    pub const fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_hours.saturating_mul(3600))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.token_ttl_hours == 0 {
            return Err(ConfigError::Validation(
                "auth.tokenTtlHours must be at least 1".to_string(),
            ));
        }
        if self.token_ttl_hours > MAX_TOKEN_TTL_HOURS {
            return Err(ConfigError::Validation(format!(
                "auth.tokenTtlHours cannot exceed {MAX_TOKEN_TTL_HOURS}"
            )));
        }
        if self.admin_role.trim().is_empty() {
            return Err(ConfigError::Validation(
                "auth.adminRole cannot be empty".to_string(),
            ));
        }
        if self.bootstrap_role_id == 0 {
            return Err(ConfigError::Validation(
                "auth.bootstrapRoleId must be at least 1".to_string(),
            ));
        }
        if self.login_attempts_per_minute == 0 {
            return Err(ConfigError::Validation(
                "auth.loginAttemptsPerMinute must be at least 1".to_string(),
            ));
        }
        self.password_policy.validate_shape()
    }
}

/// Builder for `AuthConfig`.
#[derive(Debug, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Set the signing secret (hex).
    #[must_use]
    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = Some(secret.into());
        self
    }

    /// Set token lifetime in hours.
    #[must_use]
    pub const fn token_ttl_hours(mut self, hours: u64) -> Self {
        self.config.token_ttl_hours = hours;
        self
    }

    /// Set the admin role name.
    #[must_use]
    pub fn admin_role(mut self, role: impl Into<String>) -> Self {
        self.config.admin_role = role.into();
        self
    }

    /// Set the bootstrap role id.
    #[must_use]
    pub const fn bootstrap_role_id(mut self, id: u64) -> Self {
        self.config.bootstrap_role_id = id;
        self
    }

    /// Set login attempts per minute.
    #[must_use]
    pub const fn login_attempts_per_minute(mut self, attempts: u32) -> Self {
        self.config.login_attempts_per_minute = attempts;
        self
    }

    /// Set the password policy.
    #[must_use]
    pub const fn password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.config.password_policy = policy;
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> AuthConfig {
        self.config
    }
}

/// Password strength requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordPolicy {
    /// Minimum length in characters.
    pub min_length: usize,
    /// Minimum number of lowercase letters.
    pub min_lowercase: usize,
    /// Minimum number of digits.
    pub min_digits: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            min_lowercase: 1,
            min_digits: 1,
        }
    }
}

impl PasswordPolicy {
    fn validate_shape(&self) -> Result<(), ConfigError> {
        if self.min_length < self.min_lowercase + self.min_digits {
            return Err(ConfigError::Validation(
                "auth.passwordPolicy.minLength is smaller than its character class minimums"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Data directory for the credential database.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Default filter directive (overridden by `RUST_LOG`).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.auth.token_ttl_hours, 4);
        assert_eq!(config.auth.admin_role, "admin");
        assert_eq!(config.auth.bootstrap_role_id, 1);
        assert_eq!(config.auth.token_ttl(), Duration::from_secs(4 * 3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("rolegate.json");

        let mut config = Config::default();
        config.gateway.port = 8080;
        config.auth.admin_role = "root".to_string();

        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.gateway.port, 8080);
        assert_eq!(loaded.auth.admin_role, "root");
    }

    #[test]
    fn test_json5_parsing() {
        let json5_content = r#"{
            // comments are allowed
            gateway: {
                port: 8080,
            },
            auth: {
                tokenTtlHours: 2,
                passwordPolicy: { minLength: 12, minLowercase: 2, minDigits: 2 },
            },
            logging: { format: "json" },
        }"#;

        let config: Config = json5::from_str(json5_content).unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.auth.token_ttl_hours, 2);
        assert_eq!(config.auth.password_policy.min_length, 12);
        assert_eq!(config.auth.admin_role, "admin");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.gateway.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.auth.token_ttl_hours = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.auth.bootstrap_role_id = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.auth.token_ttl_hours = MAX_TOKEN_TTL_HOURS;
        assert!(config.validate().is_ok());
        config.auth.token_ttl_hours = MAX_TOKEN_TTL_HOURS + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.auth.password_policy = PasswordPolicy {
            min_length: 2,
            min_lowercase: 2,
            min_digits: 2,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_ttl_saturates() {
        let config = AuthConfig::builder().token_ttl_hours(u64::MAX).build();
        assert_eq!(config.token_ttl(), Duration::from_secs(u64::MAX));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let config = AuthConfig::builder()
            .token_ttl_hours(12)
            .admin_role("superuser")
            .bootstrap_role_id(7)
            .build();

        assert_eq!(config.token_ttl_hours, 12);
        assert_eq!(config.admin_role, "superuser");
        assert_eq!(config.bootstrap_role_id, 7);
        assert!(config.jwt_secret.is_none());
    }

    #[test]
    fn test_overrides_report_bad_values() {
        let env = |name: &str| match name {
            "ROLEGATE_PORT" => Some("not-a-port".to_string()),
            "ROLEGATE_DATA_DIR" => Some("/srv/rolegate".to_string()),
            "ROLEGATE_JWT_SECRET" => Some(String::new()),
            _ => None,
        };

        let (config, ignored) = Config::default().with_overrides_from(env);
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.data_dir(), PathBuf::from("/srv/rolegate"));
        assert!(config.auth.jwt_secret.is_none());
        assert_eq!(
            ignored,
            vec![IgnoredOverride {
                variable: "ROLEGATE_PORT",
                value: "not-a-port".to_string(),
            }]
        );

        let (config, ignored) = Config::default()
            .with_overrides_from(|name| (name == "ROLEGATE_PORT").then(|| "4100".to_string()));
        assert_eq!(config.gateway.port, 4100);
        assert!(ignored.is_empty());
    }

    #[test]
    fn test_data_dir_override() {
        let mut config = Config::default();
        config.storage.data_dir = Some(PathBuf::from("/var/lib/rolegate"));
        assert_eq!(config.data_dir(), PathBuf::from("/var/lib/rolegate"));
    }
}
