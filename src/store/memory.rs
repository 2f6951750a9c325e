//! In-memory blob store
//!
//! Keeps persisted blobs in a process-local map. Useful for tests and for
//! deployments that never want a durable cache on disk.

use super::{BlobStore, CachedBlob};
use crate::error::{GeoError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Ephemeral blob store backed by a `RwLock<HashMap>`
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, CachedBlob>>,
}

impl MemoryBlobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted blobs
    pub fn len(&self) -> usize {
        self.blobs.read().map(|blobs| blobs.len()).unwrap_or(0)
    }

    /// True when nothing has been persisted
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, name: &str) -> Result<Option<CachedBlob>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|e| GeoError::store(format!("failed to acquire read lock: {}", e)))?;
        Ok(blobs.get(name).cloned())
    }

    async fn create(&self, name: &str) -> Result<CachedBlob> {
        Ok(CachedBlob::new(name))
    }

    async fn persist(&self, blob: &CachedBlob) -> Result<()> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|e| GeoError::store(format!("failed to acquire write lock: {}", e)))?;
        blobs.insert(blob.name.clone(), blob.clone());
        Ok(())
    }
}
