//! Configuration management for the bolt daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `/etc/boltd/boltd.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::DEFAULT_ACTION_PREFIX;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/boltd/boltd.toml";

/// Environment variable overriding the store directory.
pub const ENV_DBPATH: &str = "BOLT_DBPATH";

/// Environment variable overriding the log level.
pub const ENV_LOG_LEVEL: &str = "BOLT_LOG_LEVEL";

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("action_prefix must be non-empty and contain no whitespace, got '{0}'")]
    InvalidActionPrefix(String),

    #[error("store_dir must be an absolute path, got {0}")]
    RelativeStoreDir(String),

    #[error("pkcheck must not be empty")]
    EmptyPkcheck,
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the bolt daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// Authorization settings.
    pub auth: AuthConfig,

    /// Kernel device tree settings.
    pub sysfs: SysfsConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Root directory of the device store.
    pub store_dir: PathBuf,

    /// Path of the control socket.
    pub socket_path: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Authorization settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Prefix of the action identifiers sent to the policy authority.
    pub action_prefix: String,

    /// The `pkcheck` helper, either a path or a name looked up in `PATH`.
    pub pkcheck: String,

    /// Whether the authority may prompt the user.
    pub allow_user_interaction: bool,
}

/// Kernel device tree settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SysfsConfig {
    /// Directory listing thunderbolt devices.
    pub devices_dir: PathBuf,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("/var/lib/boltd"),
            socket_path: PathBuf::from("/run/boltd/boltd.sock"),
            log_level: "info".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            action_prefix: DEFAULT_ACTION_PREFIX.to_string(),
            pkcheck: "pkcheck".to_string(),
            allow_user_interaction: true,
        }
    }
}

impl Default for SysfsConfig {
    fn default() -> Self {
        Self {
            devices_dir: PathBuf::from("/sys/bus/thunderbolt/devices"),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - BOLT_DBPATH: Override the store directory
    /// - BOLT_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var(ENV_DBPATH) {
            if !path.is_empty() {
                tracing::info!("Overriding store_dir from environment: {}", path);
                self.daemon.store_dir = PathBuf::from(path);
            }
        }

        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.daemon.log_level = level;
            }
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        let prefix = &self.auth.action_prefix;
        if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidActionPrefix(prefix.clone()));
        }

        if self.auth.pkcheck.is_empty() {
            return Err(ConfigError::EmptyPkcheck);
        }

        if !self.daemon.store_dir.is_absolute() {
            return Err(ConfigError::RelativeStoreDir(
                self.daemon.store_dir.display().to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
