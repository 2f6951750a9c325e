//! Durable blob store for cached database payloads
//!
//! The store maps a string name to binary content. A blob with a given name
//! is unique within a store. [`BlobStore::create`] only mints an in-memory
//! handle; nothing becomes durable until [`BlobStore::persist`] is called, so
//! callers that opt out of persistence leave the store untouched.

mod memory;
mod sqlite;

pub use memory::MemoryBlobStore;
pub use sqlite::SqliteBlobStore;

use crate::download::SourceFetcher;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One named binary payload
#[derive(Debug, Clone)]
pub struct CachedBlob {
    /// Unique name within the store
    pub name: String,
    /// Raw database bytes
    pub content: Vec<u8>,
    /// When the content was last refreshed
    pub updated_at: DateTime<Utc>,
}

impl CachedBlob {
    /// Create an empty blob handle
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Replace the content with a fresh download from `url`
    ///
    /// The payload is gunzipped when the URL indicates gzip compression.
    pub async fn refresh_from_url(&mut self, fetcher: &dyn SourceFetcher, url: &str) -> Result<()> {
        let should_unzip = url.ends_with(".gz");
        self.content = fetcher.fetch(url, should_unzip).await?;
        self.updated_at = Utc::now();
        log::info!(
            "Refreshed blob '{}' from {} ({} bytes)",
            self.name,
            url,
            self.content.len()
        );
        Ok(())
    }
}

/// Name-keyed durable binary content store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the blob named `name`, if one was persisted
    async fn get(&self, name: &str) -> Result<Option<CachedBlob>>;

    /// Mint a new, empty, not-yet-durable blob handle named `name`
    async fn create(&self, name: &str) -> Result<CachedBlob>;

    /// Durably write the blob, replacing any previous content for its name
    async fn persist(&self, blob: &CachedBlob) -> Result<()>;
}
