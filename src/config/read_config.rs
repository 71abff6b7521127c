//! Configuration file reading and parsing.

use std::env;
use std::path::{Path, PathBuf};

use configparser::ini::Ini;
use thiserror::Error;

use super::types::{CacheSettings, Config, RemoteConfig, WorkspaceSettings};

// =============================================================================
// Constants - Default Values
// =============================================================================

pub(crate) const DEFAULT_REMOTE_ENDPOINT: &str = "http://127.0.0.1:7870";

const ENV_CONFIG_FILE: &str = "REVFS_CONFIG_FILE";
const DEFAULT_CONFIG_FILENAME: &str = ".revfsconfig";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config override '{0}': expected section.key=value")]
    InvalidOverride(String),

    #[error("invalid boolean for {key}: '{value}'")]
    InvalidBool { key: String, value: String },
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// =============================================================================
// ConfigSource
// =============================================================================

/// Where configuration is read from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// Path to the main configuration file. When absent, the
    /// `REVFS_CONFIG_FILE` environment variable is consulted, then the
    /// default file name in the working directory; a missing default file
    /// just yields defaults.
    pub config_file: Option<PathBuf>,
    /// Path to an overrides file, applied on top of the main file.
    pub override_file: Option<PathBuf>,
    /// `(section.key, value)` overrides applied last.
    pub overrides: Vec<(String, String)>,
}

/// Parse a `section.key=value` override argument.
pub fn parse_override(arg: &str) -> Result<(String, String)> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidOverride(arg.to_string()))?;
    if !name.contains('.') || name.starts_with('.') || name.ends_with('.') {
        return Err(ConfigError::InvalidOverride(arg.to_string()));
    }
    Ok((name.to_string(), value.to_string()))
}

// =============================================================================
// Reading
// =============================================================================

/// Read configuration from the given source, applying layers in order.
pub fn read_config(source: &ConfigSource) -> Result<Config> {
    let mut layers: Vec<Ini> = Vec::new();

    let (path, required) = locate_config_file(source);
    if path.exists() {
        layers.push(load_ini(&path)?);
    } else if required {
        return Err(ConfigError::FileNotFound(path));
    }

    if let Some(path) = &source.override_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.clone()));
        }
        layers.push(load_ini(path)?);
    }

    build_config(&layers, &source.overrides)
}

/// The main config file path and whether its absence is an error.
fn locate_config_file(source: &ConfigSource) -> (PathBuf, bool) {
    if let Some(path) = &source.config_file {
        return (path.clone(), true);
    }
    if let Ok(path) = env::var(ENV_CONFIG_FILE) {
        return (PathBuf::from(path), true);
    }
    (PathBuf::from(DEFAULT_CONFIG_FILENAME), false)
}

fn load_ini(path: &Path) -> Result<Ini> {
    let mut ini = Ini::new();
    ini.load(path).map_err(|message| ConfigError::ParseError {
        path: path.to_path_buf(),
        message,
    })?;
    Ok(ini)
}

/// Assemble a `Config` from parsed layers plus `section.key` overrides,
/// later layers winning.
fn build_config(layers: &[Ini], overrides: &[(String, String)]) -> Result<Config> {
    let get = |section: &str, key: &str| -> Option<String> {
        let full = format!("{}.{}", section, key);
        if let Some((_, value)) = overrides.iter().rev().find(|(name, _)| *name == full) {
            return Some(value.clone());
        }
        layers.iter().rev().find_map(|ini| ini.get(section, key))
    };

    let endpoint = get("remote", "endpoint").unwrap_or_else(|| DEFAULT_REMOTE_ENDPOINT.to_string());

    let cache_disable = match get("cache", "disable") {
        None => false,
        Some(value) => parse_bool("cache.disable", &value)?,
    };

    Ok(Config {
        remote: RemoteConfig { endpoint },
        workspace: WorkspaceSettings {
            repository: get("workspace", "repository"),
            revision: get("workspace", "revision"),
        },
        cache: CacheSettings {
            disable: cache_disable,
        },
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
