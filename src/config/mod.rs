//! Configuration module
//!
//! Handles loading and saving of solarfetch.toml configuration files.
//! Defines Config plus the API, CRN and NWP settings sections.

mod types;

pub use types::{ApiSettings, Config, CrnSettings, NwpSettings};

use crate::error::{Result, SolarFetchError};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "solarfetch.toml";

/// Environment variable holding the API token
pub const TOKEN_ENV: &str = "SFA_API_TOKEN";

/// Load configuration from a TOML file
pub fn load(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| {
        SolarFetchError::Config(format!(
            "Cannot read config from '{}': {}. Run 'solarfetch config init' to create one.",
            path.display(),
            e
        ))
    })?;

    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Load an explicitly requested config, or the default file when present
///
/// An explicit path must exist. Without one, a missing default file means
/// built-in defaults.
pub fn load_or_default(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => load(&path),
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                load(&default_path)
            } else {
                Ok(Config::default())
            }
        }
    }
}

/// Save configuration to a TOML file
pub fn save(config: &Config, path: &Path) -> Result<()> {
    let toml = toml::to_string_pretty(config)
        .map_err(|e| SolarFetchError::Config(format!("Failed to serialize config: {}", e)))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, toml)?;
    Ok(())
}

/// Resolve the API token from the environment or the config file
pub fn api_token(config: &Config) -> Result<String> {
    if let Ok(token) = env::var(TOKEN_ENV) {
        if !token.is_empty() {
            return Ok(token);
        }
    }
    if !config.api.token.is_empty() {
        return Ok(config.api.token.clone());
    }
    Err(SolarFetchError::Config(format!(
        "No API token configured. Set {} or api.token in {}.",
        TOKEN_ENV, DEFAULT_CONFIG_FILE
    )))
}
