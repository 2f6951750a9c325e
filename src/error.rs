//! Error types for geolookup
//!
//! This module defines custom error types using thiserror for better error handling.

use thiserror::Error;

/// Main error type for geolookup
///
/// Provisioning failures (network, download, decompression, blob store, file
/// I/O) and database decode failures are fatal to engine setup. A lookup that
/// finds nothing is not an error and never surfaces here; it is reported as an
/// empty record.
#[derive(Error, Debug)]
pub enum GeoError {
    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Download error
    #[error("Download failed: {0}")]
    Download(String),

    /// Gzip decompression error
    #[error("Decompression failed: {0}")]
    Decompress(String),

    /// Database file is not a valid decoder input
    #[error("Database decode error: {0}")]
    Decode(String),

    /// Blob store error
    #[error("Blob store error: {0}")]
    Store(String),

    /// Setup or force-update called on an engine that is already populated
    #[error("Lookup engine is already populated; setup and force_update are one-shot")]
    AlreadyPopulated,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O error
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parse error: {0}")]
    Yaml(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type alias for geolookup
pub type Result<T> = std::result::Result<T, GeoError>;

impl GeoError {
    /// Create a network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        GeoError::Network(msg.into())
    }

    /// Create a download error
    pub fn download<S: Into<String>>(msg: S) -> Self {
        GeoError::Download(msg.into())
    }

    /// Create a decompression error
    pub fn decompress<S: Into<String>>(msg: S) -> Self {
        GeoError::Decompress(msg.into())
    }

    /// Create a decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        GeoError::Decode(msg.into())
    }

    /// Create a blob store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        GeoError::Store(msg.into())
    }

    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        GeoError::Config(msg.into())
    }

    /// Create an other error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        GeoError::Other(msg.into())
    }
}

/// Convert from anyhow::Error
impl From<anyhow::Error> for GeoError {
    fn from(err: anyhow::Error) -> Self {
        GeoError::Other(err.to_string())
    }
}
