//! geolookup: IP geolocation lookup backed by locally-cached databases
//!
//! The crate manages the whole database lifecycle in front of lookups. A
//! [`LookupEngine`] is populated once per process: for each address family it
//! provisions a usable database file (local filesystem first, durable blob
//! cache second, fresh download last), opens a decoder over it, and then
//! answers `lookup` calls from every decoder in order until one resolves the
//! address.
//!
//! # Example
//!
//! ```no_run
//! use geolookup::{init_engine, Settings};
//!
//! # #[tokio::main]
//! # async fn main() -> geolookup::Result<()> {
//! let settings = Settings::load(None)?;
//! let engine = init_engine(settings).await?;
//!
//! let record = engine.lookup("64.233.161.99");
//! if let Some(city) = &record.city {
//!     println!("hello {}", city);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod download;
pub mod engine;
pub mod error;
pub mod request;
pub mod store;
pub mod utils;

// Re-export the public surface
pub use config::{DatabaseSettings, DatabaseSource, Settings};
pub use download::{Downloader, SourceFetcher};
pub use engine::{
    AddressFamily, CacheMode, DatabaseDescriptor, Decoder, DecoderFactory, DecoderOpener,
    GeoRecord, LookupEngine,
};
pub use error::{GeoError, Result};
pub use store::{BlobStore, CachedBlob, MemoryBlobStore, SqliteBlobStore};

use std::sync::Arc;

/// Build the serving engine over the durable blob store
///
/// Provisions eagerly unless the settings disable `setup_clients`. The caller
/// owns the returned engine and hands it to request-handling code explicitly;
/// there is no global registry.
pub async fn init_engine(settings: Settings) -> Result<Arc<LookupEngine>> {
    let store = Arc::new(SqliteBlobStore::open(settings.resolve_store_path()?).await?);
    let should_setup = settings.setup_clients;

    let engine = Arc::new(LookupEngine::new(settings, store)?);
    if should_setup {
        engine.setup().await?;
    }

    Ok(engine)
}
