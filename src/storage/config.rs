//! Configuration file loading and management.
//!
//! Loads configuration from:
//! - Linux: `~/.config/insight/config.toml`
//! - macOS: `~/Library/Application Support/com.insight.insight/config.toml`
//! - Windows: `%APPDATA%/insight/insight/config/config.toml`
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `INSIGHT_TIMEOUT`: Request timeout in seconds
//! - `INSIGHT_REFRESH_INTERVAL`: Auto-refresh period in seconds (0 disables)
//! - `INSIGHT_CONFIG`: Override config file path
//!
//! Logging variables (`INSIGHT_LOG*`) are read by `core::logging`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::core::scheduler::RefreshInterval;
use crate::error::{InsightError, Result};

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Environment variable for timeout in seconds.
pub const ENV_TIMEOUT: &str = "INSIGHT_TIMEOUT";
/// Environment variable for the refresh interval in seconds.
pub const ENV_REFRESH_INTERVAL: &str = "INSIGHT_REFRESH_INTERVAL";
/// Environment variable to override config file path.
pub const ENV_CONFIG: &str = "INSIGHT_CONFIG";

const MAX_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Values supplied on the command line, if any.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigOverrides {
    pub timeout_secs: Option<u64>,
    pub refresh_interval_secs: Option<u64>,
    pub insecure_tls: Option<bool>,
}

/// Fully resolved configuration after merging CLI, env vars, and config file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Accept invalid certificates for new connections.
    pub insecure_tls: bool,
    /// Auto-refresh period.
    pub refresh: RefreshInterval,
    /// Lifetime of cached status documents; `None` never expires.
    pub status_ttl: Option<Duration>,
    /// Log level from the config file.
    pub log_level: Option<String>,
    /// Source of each setting for debugging.
    pub sources: ConfigSources,
}

/// Tracks the source of each configuration value.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub timeout: ConfigSource,
    pub insecure_tls: ConfigSource,
    pub refresh: ConfigSource,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value from CLI flag.
    Cli,
    /// Value from environment variable.
    Env,
    /// Value from config file.
    ConfigFile,
    /// Built-in default.
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI flag"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

impl ResolvedConfig {
    /// Resolve final configuration from CLI overrides, the process
    /// environment, and the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file exists but is invalid
    /// - The resolved timeout is out of bounds
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let config = Self::load_config(&env)?;
        Self::resolve_with(&config, overrides, &env)
    }

    /// Resolve against an explicit config and environment lookup.
    ///
    /// # Errors
    /// Returns an error if the config or the resolved timeout is invalid.
    pub fn resolve_with(
        config: &Config,
        overrides: &ConfigOverrides,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        config.validate()?;

        let mut sources = ConfigSources::default();
        let timeout = Self::resolve_timeout(overrides, config, env, &mut sources.timeout);
        validate_timeout(timeout.as_secs())?;

        let insecure_tls = if let Some(insecure) = overrides.insecure_tls {
            sources.insecure_tls = ConfigSource::Cli;
            insecure
        } else {
            sources.insecure_tls = ConfigSource::ConfigFile;
            config.connection.insecure_tls
        };

        let refresh = Self::resolve_refresh(overrides, config, env, &mut sources.refresh);

        let status_ttl = match config.cache.status_ttl_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            timeout,
            insecure_tls,
            refresh,
            status_ttl,
            log_level: config.general.log_level.clone(),
            sources,
        })
    }

    /// Load config file, respecting INSIGHT_CONFIG override.
    fn load_config(env: &dyn Fn(&str) -> Option<String>) -> Result<Config> {
        if let Some(path) = env(ENV_CONFIG) {
            Config::load_from(Path::new(&path))
        } else {
            Config::load()
        }
    }

    fn resolve_timeout(
        overrides: &ConfigOverrides,
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
        source: &mut ConfigSource,
    ) -> Duration {
        // 1. CLI flag
        if let Some(secs) = overrides.timeout_secs {
            *source = ConfigSource::Cli;
            return Duration::from_secs(secs);
        }

        // 2. Environment variable
        if let Some(secs) = parse_env_secs(env, ENV_TIMEOUT) {
            *source = ConfigSource::Env;
            return Duration::from_secs(secs);
        }

        // 3. Config file
        *source = ConfigSource::ConfigFile;
        Duration::from_secs(config.general.timeout_seconds)
    }

    fn resolve_refresh(
        overrides: &ConfigOverrides,
        config: &Config,
        env: &dyn Fn(&str) -> Option<String>,
        source: &mut ConfigSource,
    ) -> RefreshInterval {
        // 1. CLI flag
        if let Some(secs) = overrides.refresh_interval_secs {
            *source = ConfigSource::Cli;
            return RefreshInterval::from_secs(secs);
        }

        // 2. Environment variable
        if let Some(secs) = parse_env_secs(env, ENV_REFRESH_INTERVAL) {
            *source = ConfigSource::Env;
            return RefreshInterval::from_secs(secs);
        }

        // 3. Config file
        *source = ConfigSource::ConfigFile;
        if config.refresh.enabled {
            RefreshInterval::from_secs(config.refresh.interval_seconds)
        } else {
            RefreshInterval::Disabled
        }
    }
}

fn parse_env_secs(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = env(key)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u64>() {
        Ok(secs) => Some(secs),
        Err(e) => {
            tracing::warn!(var = key, value = trimmed, error = %e, "Ignoring invalid environment override");
            None
        }
    }
}

fn validate_timeout(secs: u64) -> Result<()> {
    if secs == 0 || secs > MAX_TIMEOUT_SECS {
        return Err(InsightError::Config(format!(
            "Timeout must be between 1 and {MAX_TIMEOUT_SECS} seconds"
        )));
    }
    Ok(())
}

// =============================================================================
// Config File
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Connection defaults.
    pub connection: ConnectionConfig,
    /// Auto-refresh settings.
    pub refresh: RefreshConfig,
    /// Cache settings.
    pub cache: CacheConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default timeout for network requests in seconds.
    pub timeout_seconds: u64,
    /// Default log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
}

/// Connection defaults applied to new profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Accept self-signed or otherwise invalid certificates.
    pub insecure_tls: bool,
}

/// Auto-refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of cached status documents; 0 keeps them forever.
    pub status_ttl_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            log_level: None,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { insecure_tls: true }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 300,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            status_ttl_seconds: 60,
        }
    }
}

impl Config {
    /// Load configuration from the default config file path.
    ///
    /// Returns default config if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error only if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific path.
    ///
    /// Returns default config if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error only if the file exists but is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "Loading config file");
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| InsightError::Config(format!("Invalid config file: {e}")))?;

        Ok(config)
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| InsightError::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)?;
        tracing::debug!(?path, "Config file saved");
        Ok(())
    }

    /// Get the config file path.
    #[must_use]
    pub fn config_path() -> PathBuf {
        AppPaths::new().config_file()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns an error if the timeout is outside 1-300 seconds.
    pub fn validate(&self) -> Result<()> {
        validate_timeout(self.general.timeout_seconds)
    }
}
