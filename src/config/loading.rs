//! Configuration loading.
//!
//! Resolves the config path (default XDG location or a `--config` override),
//! creates a default file when none exists, then parses and validates.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::Config;
use super::validation::validate_config;
use crate::common::constants::*;

/// Global configuration directory, set once at startup
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for the current process.
/// Can only be called once; returns an error if already set.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// The custom configuration directory, if one was set.
pub fn get_custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|d| d.clone())
}

/// Load configuration from the resolved path, creating a default file first
/// if none exists.
pub fn load() -> Result<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        super::builder::create_default_config(&config_path)
            .context("Failed to create default config during load")?;
        log_decorated!("Created default configuration at {}", config_path.display());
    }

    load_from_path(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))
}

/// Load configuration from a specific path. Does not create anything.
pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!("Configuration file not found at {}", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;

    validate_config(&config)?;

    Ok(config)
}

/// Path of `smartflag.toml`: `<custom dir>/smartflag.toml` when a directory
/// was set, otherwise under the user config directory.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = get_custom_config_dir() {
        return Ok(custom_dir.join(CONFIG_FILE_NAME));
    }

    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
