//! Type definitions for the lookup engine
//!
//! This module contains the common types shared by provisioning, decoding and
//! the engine itself.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Address family of a configured database
///
/// The order of [`AddressFamily::ALL`] drives both provisioning and the
/// decoder-trial order during lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Default provisioning and decoder-trial order
    pub const ALL: [AddressFamily; 2] = [AddressFamily::V4, AddressFamily::V6];

    /// Short configuration key for this family
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::V4 => "ip4",
            AddressFamily::V6 => "ip6",
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where one database comes from and where it lives
///
/// One descriptor per address family, derived from the settings each time the
/// engine is populated. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseDescriptor {
    /// Blob store entry name
    pub name: String,
    /// Local filesystem path checked before any store or network access
    pub local_path: PathBuf,
    /// Source URL for (re)download
    pub source_url: String,
}

/// How a decoder holds its database
///
/// A pass-through performance knob with no effect on lookup results: either
/// the whole file is read into memory, or it is memory-mapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Read the database fully into memory (default)
    #[default]
    Memory,
    /// Memory-map the database file
    Mmap,
}

/// Geographic metadata for one resolved address
///
/// All fields are optional; serialization omits absent fields rather than
/// null-filling them. An empty record means "no match".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeoRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dma_code: Option<u16>,
}

impl GeoRecord {
    /// True when no field is populated, i.e. the address did not match
    pub fn is_empty(&self) -> bool {
        *self == GeoRecord::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_order_is_v4_first() {
        assert_eq!(AddressFamily::ALL[0], AddressFamily::V4);
        assert_eq!(AddressFamily::ALL[1], AddressFamily::V6);
        assert_eq!(AddressFamily::V4.as_str(), "ip4");
        assert_eq!(AddressFamily::V6.to_string(), "ip6");
    }

    #[test]
    fn test_default_record_is_empty() {
        assert!(GeoRecord::default().is_empty());
        let record = GeoRecord {
            city: Some("Mountain View".to_string()),
            ..Default::default()
        };
        assert!(!record.is_empty());
    }

    #[test]
    fn test_serialization_omits_absent_fields() {
        let json = serde_json::to_string(&GeoRecord::default()).unwrap();
        assert_eq!(json, "{}");

        let record = GeoRecord {
            city: Some("Mountain View".to_string()),
            area_code: Some(650),
            ..Default::default()
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"city\""));
        assert!(json.contains("\"area_code\":650"));
        assert!(!json.contains("null"));
    }

    #[test]
    fn test_cache_mode_parses_lowercase() {
        let mode: CacheMode = serde_yaml::from_str("mmap").unwrap();
        assert_eq!(mode, CacheMode::Mmap);
        assert_eq!(CacheMode::default(), CacheMode::Memory);
    }
}
