//! Path utilities for configuration and cached data files
//!
//! Handles XDG directory specifications and path resolution.

use crate::error::{GeoError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Get the geolookup configuration directory
///
/// Priority:
/// 1. GEOLOOKUP_CONFIG_HOME environment variable
/// 2. GEOLOOKUP_HOME environment variable
/// 3. XDG_CONFIG_HOME/geolookup
/// 4. ~/.config/geolookup (fallback)
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(path) = env::var("GEOLOOKUP_CONFIG_HOME") {
        return Ok(PathBuf::from(path));
    }

    if let Ok(path) = env::var("GEOLOOKUP_HOME") {
        return Ok(PathBuf::from(path));
    }

    if let Some(config_dir) = dirs::config_dir() {
        return Ok(config_dir.join("geolookup"));
    }

    Err(GeoError::config("unable to determine config directory"))
}

/// Get the geolookup data directory for the durable blob store
///
/// Priority:
/// 1. GEOLOOKUP_DATA_HOME environment variable
/// 2. GEOLOOKUP_HOME environment variable
/// 3. XDG_DATA_HOME/geolookup
/// 4. ~/.local/share/geolookup (fallback)
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(path) = env::var("GEOLOOKUP_DATA_HOME") {
        return Ok(PathBuf::from(path));
    }

    if let Ok(path) = env::var("GEOLOOKUP_HOME") {
        return Ok(PathBuf::from(path));
    }

    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("geolookup"));
    }

    Err(GeoError::config("unable to determine data directory"))
}

/// Get the path to the config file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.yaml"))
}

/// Get the default path of the durable blob store
pub fn default_store_file() -> Result<PathBuf> {
    Ok(data_dir()?.join("blobs.db"))
}

/// Ensure directory exists, create if necessary
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .map_err(|e| GeoError::config(format!("failed to create directory: {}", e)))?;
    }
    Ok(())
}
