//! Database provisioning
//!
//! Guarantees a usable local database file for one descriptor before a
//! decoder is opened. The filesystem wins; otherwise the blob store is
//! consulted, downloading fresh content when the blob is new or a refresh is
//! forced, and the bytes are materialized as a temporary file.

use crate::download::SourceFetcher;
use crate::engine::types::DatabaseDescriptor;
use crate::error::Result;
use crate::store::BlobStore;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A usable local database file
///
/// `Local` borrows a file that ships with the deployment and is left alone.
/// `Temp` owns a materialized copy of cached content; the file is deleted
/// when the value is dropped, whether or not the decoder opened it.
pub enum ProvisionedDatabase {
    Local(PathBuf),
    Temp(NamedTempFile),
}

impl ProvisionedDatabase {
    /// Path to hand to the decoder factory
    pub fn path(&self) -> &Path {
        match self {
            ProvisionedDatabase::Local(path) => path,
            ProvisionedDatabase::Temp(file) => file.path(),
        }
    }
}

/// Ensure a usable local file exists for `descriptor`
///
/// Any download, decompression, store or filesystem failure is fatal for
/// this database; there are no partial-success semantics.
pub async fn provision(
    descriptor: &DatabaseDescriptor,
    store: &dyn BlobStore,
    fetcher: &dyn SourceFetcher,
    force_refresh: bool,
    should_persist: bool,
) -> Result<ProvisionedDatabase> {
    // Fast path for deployments that ship the database alongside the app
    if descriptor.local_path.exists() {
        log::debug!(
            "Using local database file {}",
            descriptor.local_path.display()
        );
        return Ok(ProvisionedDatabase::Local(descriptor.local_path.clone()));
    }

    let (mut blob, is_new) = match store.get(&descriptor.name).await? {
        Some(blob) => (blob, false),
        None => (store.create(&descriptor.name).await?, true),
    };

    if is_new || force_refresh {
        blob.refresh_from_url(fetcher, &descriptor.source_url)
            .await?;
        if should_persist {
            store.persist(&blob).await?;
        }
    }

    let mut file = NamedTempFile::new()?;
    file.write_all(&blob.content)?;
    file.flush()?;
    log::debug!(
        "Materialized blob '{}' as {}",
        descriptor.name,
        file.path().display()
    );

    Ok(ProvisionedDatabase::Temp(file))
}
