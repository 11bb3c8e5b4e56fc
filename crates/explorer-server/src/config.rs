//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database directory settings.
    #[serde(default)]
    pub databases: DatabasesConfig,

    /// Session cookie settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database directory configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabasesConfig {
    /// Folder holding the `*.db` files. Created on startup if missing.
    #[serde(default = "default_db_dir")]
    pub dir: String,

    /// How long a statement waits on a locked database file, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Where session state is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    /// Entire session serialized into the signed cookie.
    #[default]
    Cookie,
    /// Session kept in server memory; the cookie carries a signed id only.
    Memory,
}

impl FromStr for SessionStoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cookie" => Ok(Self::Cookie),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown session store '{other}'")),
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Secret used to sign session cookies. When unset a random secret is
    /// generated at startup and sessions do not survive restarts.
    #[serde(default)]
    pub secret: Option<String>,

    /// Session storage backend.
    #[serde(default)]
    pub store: SessionStoreKind,

    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "explorer_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    5000
}

fn default_db_dir() -> String {
    "databases".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_cookie_name() -> String {
    "explorer_session".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabasesConfig {
    fn default() -> Self {
        Self {
            dir: default_db_dir(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: None,
            store: SessionStoreKind::default(),
            cookie_name: default_cookie_name(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `EXPLORER_HOST` overrides `server.host`
/// - `EXPLORER_PORT` overrides `server.port`
/// - `EXPLORER_DB_DIR` overrides `databases.dir`
/// - `EXPLORER_BUSY_TIMEOUT_MS` overrides `databases.busy_timeout_ms`
/// - `EXPLORER_SESSION_SECRET` overrides `session.secret`
/// - `EXPLORER_SESSION_STORE` overrides `session.store` ("cookie" or "memory")
/// - `EXPLORER_LOG_LEVEL` overrides `logging.level`
/// - `EXPLORER_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    Ok(apply_env_overrides(config, |key| std::env::var(key).ok()))
}

fn apply_env_overrides(mut config: Config, var: impl Fn(&str) -> Option<String>) -> Config {
    if let Some(host) = var("EXPLORER_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("EXPLORER_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(dir) = var("EXPLORER_DB_DIR") {
        config.databases.dir = dir;
    }
    if let Some(timeout) = var("EXPLORER_BUSY_TIMEOUT_MS") {
        if let Ok(parsed) = timeout.parse() {
            config.databases.busy_timeout_ms = parsed;
        }
    }
    if let Some(secret) = var("EXPLORER_SESSION_SECRET") {
        if !secret.is_empty() {
            config.session.secret = Some(secret);
        }
    }
    if let Some(store) = var("EXPLORER_SESSION_STORE") {
        match store.parse() {
            Ok(kind) => config.session.store = kind,
            Err(e) => tracing::warn!(error = %e, "ignoring EXPLORER_SESSION_STORE"),
        }
    }
    if let Some(level) = var("EXPLORER_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("EXPLORER_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    config
}
