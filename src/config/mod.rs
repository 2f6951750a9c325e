//! Configuration module for geolookup
//!
//! Settings are loaded once from a YAML file, with defaults baked in and
//! environment variable overrides applied, then validated. All later code
//! works against this typed structure; no per-call default lookups.

use crate::engine::{AddressFamily, CacheMode, DatabaseDescriptor};
use crate::error::{GeoError, Result};
use crate::utils::path;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DOWNLOAD_STUB: &str = "https://geolite.maxmind.com/download/geoip/database";

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Per-address-family database sources
    #[serde(default)]
    pub databases: DatabaseSettings,

    /// Provision databases eagerly when the service is initialized
    #[serde(default = "default_true")]
    pub setup_clients: bool,

    /// Decoder cache mode
    #[serde(default)]
    pub cache_mode: CacheMode,

    /// Path of the durable blob store; platform data dir when absent
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

/// One database source per supported address family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_ip4_source")]
    pub ip4: DatabaseSource,

    #[serde(default = "default_ip6_source")]
    pub ip6: DatabaseSource,
}

/// Where one database is named, shipped and downloaded from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSource {
    /// Blob store entry name
    pub name: String,
    /// Local filesystem path checked before the blob store or the network
    pub path: PathBuf,
    /// Source URL; a `.gz` suffix marks the payload as gzip-compressed
    pub url: String,
}

fn default_true() -> bool {
    true
}

fn default_ip4_source() -> DatabaseSource {
    DatabaseSource {
        name: "GeoLiteCity".to_string(),
        path: PathBuf::from("vendor/GeoLiteCity.dat"),
        url: format!("{}/GeoLiteCity.dat.gz", DOWNLOAD_STUB),
    }
}

fn default_ip6_source() -> DatabaseSource {
    DatabaseSource {
        name: "GeoLiteCityv6".to_string(),
        path: PathBuf::from("vendor/GeoLiteCityv6.dat"),
        url: format!("{}/GeoLiteCityv6-beta/GeoLiteCityv6.dat.gz", DOWNLOAD_STUB),
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            ip4: default_ip4_source(),
            ip6: default_ip6_source(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            databases: DatabaseSettings::default(),
            setup_clients: true,
            cache_mode: CacheMode::default(),
            store_path: None,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file and environment variables
    ///
    /// The file is taken from `explicit_path` when given, else from the
    /// `GEOLOOKUP_CONFIG` environment variable, else from the platform config
    /// directory. A missing file at the implicit locations yields defaults; an
    /// explicitly named file must exist.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let (config_file, required) = match explicit_path {
            Some(p) => (p.to_path_buf(), true),
            None => match env::var("GEOLOOKUP_CONFIG") {
                Ok(p) => (PathBuf::from(p), true),
                Err(_) => (path::config_file()?, false),
            },
        };

        let mut settings = if config_file.exists() {
            let content = fs::read_to_string(&config_file)
                .map_err(|e| GeoError::config(format!("failed to read config file: {}", e)))?;
            serde_yaml::from_str(&content)
                .map_err(|e| GeoError::Yaml(format!("failed to parse config file: {}", e)))?
        } else if required {
            return Err(GeoError::config(format!(
                "config file not found: {}",
                config_file.display()
            )));
        } else {
            Self::default()
        };

        settings.apply_env();
        settings.validate()?;

        Ok(settings)
    }

    /// Apply environment variable overrides
    fn apply_env(&mut self) {
        if let Ok(val) = env::var("GEOLOOKUP_IP4_URL") {
            self.databases.ip4.url = val;
        }
        if let Ok(val) = env::var("GEOLOOKUP_IP6_URL") {
            self.databases.ip6.url = val;
        }
        if let Ok(val) = env::var("GEOLOOKUP_STORE") {
            self.store_path = Some(PathBuf::from(val));
        }
    }

    /// Validate the loaded settings once, up front
    fn validate(&self) -> Result<()> {
        for family in AddressFamily::ALL {
            let source = self.source(family);
            if source.name.trim().is_empty() {
                return Err(GeoError::config(format!("{} database name is empty", family)));
            }
            if source.url.trim().is_empty() {
                return Err(GeoError::config(format!("{} database url is empty", family)));
            }
        }
        if self.databases.ip4.name == self.databases.ip6.name {
            return Err(GeoError::config(
                "ip4 and ip6 databases must use distinct blob names",
            ));
        }
        Ok(())
    }

    /// The configured source for one address family
    pub fn source(&self, family: AddressFamily) -> &DatabaseSource {
        match family {
            AddressFamily::V4 => &self.databases.ip4,
            AddressFamily::V6 => &self.databases.ip6,
        }
    }

    /// Build the descriptor for one address family
    pub fn descriptor(&self, family: AddressFamily) -> DatabaseDescriptor {
        let source = self.source(family);
        DatabaseDescriptor {
            name: source.name.clone(),
            local_path: source.path.clone(),
            source_url: source.url.clone(),
        }
    }

    /// Resolve the blob store path, falling back to the platform data dir
    pub fn resolve_store_path(&self) -> Result<PathBuf> {
        let store_path = match &self.store_path {
            Some(p) => p.clone(),
            None => path::default_store_file()?,
        };
        if let Some(parent) = store_path.parent() {
            path::ensure_dir(parent)?;
        }
        Ok(store_path)
    }
}
