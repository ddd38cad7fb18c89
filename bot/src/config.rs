//! Environment-based configuration.
//!
//! Required secrets must be present; everything else falls back to a default
//! when unset or unparseable. `.env` files are honoured by the binary, which
//! calls `dotenvy::dotenv()` before [`Config::from_env`].

use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Largest leaderboard a single embed renders comfortably.
pub const MAX_LEADERBOARD_SIZE: usize = 25;

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable not set
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(&'static str),

    /// Value present but unusable
    #[error("Invalid value for {name}: {reason}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// What was wrong with it
        reason: String,
    },
}

/// Discord application credentials.
#[derive(Clone)]
pub struct DiscordConfig {
    /// Bot token for REST calls
    pub token: String,
    /// Application (client) id, for command registration
    pub application_id: String,
    /// Hex-encoded Ed25519 key that signs inbound interactions
    pub public_key: String,
    /// Channel receiving backup reports
    pub backup_channel_id: String,
    /// Overwrite the global commands at startup
    pub register_commands: bool,
    /// Per-request limit of the REST client
    pub request_timeout: Duration,
    /// Limit on posting a backup report before the wipe goes ahead without it
    pub backup_timeout: Duration,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"<redacted>")
            .field("application_id", &self.application_id)
            .field("public_key", &self.public_key)
            .field("backup_channel_id", &self.backup_channel_id)
            .field("register_commands", &self.register_commands)
            .field("request_timeout", &self.request_timeout)
            .field("backup_timeout", &self.backup_timeout)
            .finish()
    }
}

/// Database settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// sqlx connection string
    pub url: String,
    /// Pool size
    pub max_connections: u32,
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// How long an interaction may take before the failure reply is sent
    pub response_timeout: Duration,
    /// Drain period for in-flight effects on shutdown
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    /// Socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when host and port do not form an address.
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "HOST",
                reason: e.to_string(),
            })
    }
}

/// Full bot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord credentials
    pub discord: DiscordConfig,
    /// Database settings
    pub database: DatabaseConfig,
    /// HTTP listener
    pub server: ServerConfig,
    /// Role name allowed to use staff actions
    pub staff_role: String,
    /// Members shown on the overview
    pub leaderboard_size: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EnvVarNotSet`] when a required secret is missing,
    /// or [`ConfigError::Invalid`] when a value fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            discord: DiscordConfig {
                token: required("DISCORD_TOKEN")?,
                application_id: required("DISCORD_APPLICATION_ID")?,
                public_key: required("DISCORD_PUBLIC_KEY")?,
                backup_channel_id: required("BACKUP_CHANNEL_ID")?,
                register_commands: parsed("REGISTER_COMMANDS", true),
                request_timeout: Duration::from_millis(parsed("DISCORD_REQUEST_TIMEOUT_MS", 1500)),
                backup_timeout: Duration::from_millis(parsed("BACKUP_TIMEOUT_MS", 1500)),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://tally.db?mode=rwc".to_string()),
                max_connections: parsed("DATABASE_MAX_CONNECTIONS", 5),
            },
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parsed("PORT", 8080),
                response_timeout: Duration::from_millis(parsed("RESPONSE_TIMEOUT_MS", 2500)),
                shutdown_timeout: Duration::from_secs(parsed("SHUTDOWN_TIMEOUT", 10)),
            },
            staff_role: env::var("STAFF_ROLE_NAME").unwrap_or_else(|_| ".".to_string()),
            leaderboard_size: parsed("LEADERBOARD_SIZE", 10),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending variable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.staff_role.is_empty() {
            return Err(invalid("STAFF_ROLE_NAME", "must not be empty"));
        }
        if self.leaderboard_size == 0 || self.leaderboard_size > MAX_LEADERBOARD_SIZE {
            return Err(invalid(
                "LEADERBOARD_SIZE",
                &format!("must be between 1 and {MAX_LEADERBOARD_SIZE}"),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(invalid("DATABASE_MAX_CONNECTIONS", "must be > 0"));
        }
        if self.server.response_timeout.is_zero() {
            return Err(invalid("RESPONSE_TIMEOUT_MS", "must be > 0"));
        }
        if self.discord.request_timeout.is_zero() {
            return Err(invalid("DISCORD_REQUEST_TIMEOUT_MS", "must be > 0"));
        }
        // The wipe runs after the backup, inside the same reply window
        if self.discord.backup_timeout.is_zero() || self.discord.backup_timeout >= self.server.response_timeout {
            return Err(invalid("BACKUP_TIMEOUT_MS", "must be > 0 and below RESPONSE_TIMEOUT_MS"));
        }
        if !hex::decode(&self.discord.public_key).is_ok_and(|key| key.len() == 32) {
            return Err(invalid("DISCORD_PUBLIC_KEY", "expected 64 hex characters"));
        }
        Ok(())
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::EnvVarNotSet(name))
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}
