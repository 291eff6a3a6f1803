//! Configuration management for the dacl server components.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! # Configuration Hierarchy
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use dacl_server::config::ServerConfig;
//!
//! // Load from file with env overrides
//! let config = ServerConfig::load("dacl.yaml")?;
//!
//! // Or load from environment only
//! let config = ServerConfig::from_env()?;
//! ```

use config::{Config, ConfigError, Environment, File, FileFormat};
use dacl_domain::authz::DEFAULT_ENTRY;
use dacl_domain::cache::DEFAULT_CACHE_SIZE;
use dacl_domain::resolver::{ResolverConfig, DEFAULT_GROUP_TYPES};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Directory formulas and group classification
    #[serde(default)]
    pub directory: DirectorySettings,

    /// Synchronizer settings
    #[serde(default)]
    pub sync: SyncSettings,

    /// Authorization cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Authorization engine settings
    #[serde(default)]
    pub authz: AuthzSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Directory settings.
///
/// These settings can be overridden via environment variables with the `DACL_`
/// prefix and `__` as the nested key separator:
///
/// - `DACL_DIRECTORY__SELECTION_FORMULA=@True`
/// - `DACL_DIRECTORY__USERNAME_FORMULA=@LowerCase(ShortName)`
///
/// # Example YAML Configuration
///
/// ```yaml
/// directory:
///   selection_formula: 'Department = "Engineering"'
///   username_formula: "@LowerCase(ShortName)"
///   group_types: ["0", "2", "3"]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DirectorySettings {
    /// Formula deciding whether a person is synchronized. Non-zero selects.
    #[serde(default = "default_selection_formula")]
    pub selection_formula: String,

    /// Formula producing the principal id of a person.
    #[serde(default = "default_username_formula")]
    pub username_formula: String,

    /// Group type classifications treated as access-control groups.
    #[serde(default = "default_group_types")]
    pub group_types: Vec<String>,

    /// Maximum group nesting depth followed during expansion.
    #[serde(default = "default_max_depth")]
    pub max_nesting_depth: u32,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            selection_formula: default_selection_formula(),
            username_formula: default_username_formula(),
            group_types: default_group_types(),
            max_nesting_depth: default_max_depth(),
        }
    }
}

impl DirectorySettings {
    /// Resolver configuration derived from these settings.
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::default()
            .with_group_types(self.group_types.iter().map(|t| t.trim().to_string()))
            .with_max_depth(self.max_nesting_depth)
    }
}

fn default_selection_formula() -> String {
    "@True".to_string()
}

fn default_username_formula() -> String {
    "@LowerCase(ShortName)".to_string()
}

fn default_group_types() -> Vec<String> {
    DEFAULT_GROUP_TYPES.iter().map(|t| t.to_string()).collect()
}

fn default_max_depth() -> u32 {
    ResolverConfig::default().max_depth
}

/// Synchronizer settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SyncSettings {
    /// Minimum seconds between two unforced synchronizations.
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval(),
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_sync_interval() -> u64 {
    3600
}

/// Authorization cache settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CacheSettings {
    /// Maximum number of cached decisions. Zero disables caching.
    #[serde(default = "default_cache_size")]
    pub max_size: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: default_cache_size(),
        }
    }
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

/// Authorization engine settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AuthzSettings {
    /// Permit-list entry that grants every principal access to a resource.
    #[serde(default = "default_sentinel")]
    pub default_entry: String,
}

impl Default for AuthzSettings {
    fn default() -> Self {
        Self {
            default_entry: default_sentinel(),
        }
    }
}

fn default_sentinel() -> String {
    DEFAULT_ENTRY.to_string()
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `DACL_` and use `__` as separator.
    /// For example:
    /// - `DACL_SYNC__INTERVAL_SECS=600` overrides `sync.interval_secs`
    /// - `DACL_CACHE__MAX_SIZE=500` overrides `cache.max_size`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            // DACL_SYNC__INTERVAL_SECS -> sync.interval_secs
            .add_source(
                Environment::with_prefix("DACL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(
                Environment::with_prefix("DACL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.directory.username_formula.trim().is_empty() {
            return Err(ConfigLoadError::Invalid {
                message: "directory.username_formula cannot be empty".to_string(),
            });
        }

        if self.directory.selection_formula.trim().is_empty() {
            return Err(ConfigLoadError::Invalid {
                message: "directory.selection_formula cannot be empty".to_string(),
            });
        }

        if self.directory.group_types.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigLoadError::Invalid {
                message: "directory.group_types must name at least one group type".to_string(),
            });
        }

        if self.directory.max_nesting_depth == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "directory.max_nesting_depth must be greater than 0".to_string(),
            });
        }

        if self.authz.default_entry.trim().is_empty() {
            return Err(ConfigLoadError::Invalid {
                message: "authz.default_entry cannot be empty".to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        Ok(())
    }
}
