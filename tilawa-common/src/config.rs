//! Configuration file discovery and data folder resolution
//!
//! Resolution order for the config file:
//! 1. Command-line argument
//! 2. `TILAWA_CONFIG` environment variable
//! 3. User config dir (`~/.config/tilawa/config.toml` on Linux)
//! 4. `/etc/tilawa/config.toml` (Linux only)
//!
//! A missing config file is not an error; callers fall back to built-in
//! defaults and log a warning.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TILAWA_CONFIG";

/// Environment variable overriding the data folder
pub const DATA_DIR_ENV_VAR: &str = "TILAWA_DATA_DIR";

const APP_DIR: &str = "tilawa";
const CONFIG_FILE: &str = "config.toml";

/// Locate the config file to load, if any
///
/// Explicit paths (CLI or env) are returned even when they do not exist, so
/// that the loader reports a clear error instead of silently using defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILE);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Folder holding the database and other persistent state
pub fn resolve_data_dir(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_DIR_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    default_data_dir()
}

/// OS-dependent default data folder
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./tilawa_data"))
}

/// Read and deserialize a TOML file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Load a TOML config, or defaults when no file was found
///
/// Returns the config and the path it was loaded from.
pub fn load_or_default<T: DeserializeOwned + Default>(
    cli_arg: Option<&Path>,
) -> Result<(T, Option<PathBuf>)> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            let config = load_toml(&path)?;
            Ok((config, Some(path)))
        }
        None => {
            tracing::warn!("No config file found, using built-in defaults");
            Ok((T::default(), None))
        }
    }
}

/// Create the data folder if needed
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        tracing::info!("Created data folder: {}", path.display());
    }
    Ok(())
}
