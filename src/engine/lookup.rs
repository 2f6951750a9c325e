//! Lookup engine - owns decoders and answers address lookups
//!
//! The engine is populated exactly once, then shared read-only across all
//! concurrent lookup callers.
//!
//! # Thread Safety
//!
//! `LookupEngine` is thread-safe and meant to be shared via `Arc`. Decoder
//! state is only written while populating; steady-state lookups take the read
//! side of the lock and never block each other. The lifecycle tag is advanced
//! with an atomic compare-exchange, so concurrent `setup` calls cannot race:
//! exactly one proceeds, the others fail loudly.

use crate::config::Settings;
use crate::download::{Downloader, SourceFetcher};
use crate::engine::decoder::{Decoder, DecoderFactory, DecoderOpener};
use crate::engine::provision::provision;
use crate::engine::types::{AddressFamily, DatabaseDescriptor, GeoRecord};
use crate::error::{GeoError, Result};
use crate::store::BlobStore;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

// Lifecycle tag values: populating counts as "already claimed" for the
// one-shot guard, so a failed population must restore Empty before returning.
const STATE_EMPTY: u8 = 0;
const STATE_POPULATING: u8 = 1;
const STATE_POPULATED: u8 = 2;

/// Multi-database address lookup engine
///
/// Owns one decoder per configured address family, in a fixed order, plus the
/// descriptors they were provisioned from. Populated at most once per
/// instance; refreshing data means building a new engine.
pub struct LookupEngine {
    settings: Settings,
    store: Arc<dyn BlobStore>,
    fetcher: Arc<dyn SourceFetcher>,
    opener: Box<dyn DecoderOpener>,
    should_persist: bool,
    force_refresh: AtomicBool,
    state: AtomicU8,
    inner: RwLock<EngineInner>,
}

#[derive(Default)]
struct EngineInner {
    decoders: Vec<Box<dyn Decoder>>,
    databases: Vec<DatabaseDescriptor>,
}

impl LookupEngine {
    /// Create an engine with the default downloader and decoder factory
    ///
    /// Refreshed blobs are persisted to the store.
    pub fn new(settings: Settings, store: Arc<dyn BlobStore>) -> Result<Self> {
        Ok(Self::with_components(
            settings,
            store,
            Arc::new(Downloader::new()?),
            Box::new(DecoderFactory),
            true,
        ))
    }

    /// Create an engine from explicit collaborators
    pub fn with_components(
        settings: Settings,
        store: Arc<dyn BlobStore>,
        fetcher: Arc<dyn SourceFetcher>,
        opener: Box<dyn DecoderOpener>,
        should_persist: bool,
    ) -> Self {
        Self {
            settings,
            store,
            fetcher,
            opener,
            should_persist,
            force_refresh: AtomicBool::new(false),
            state: AtomicU8::new(STATE_EMPTY),
            inner: RwLock::new(EngineInner::default()),
        }
    }

    /// Provision and open one decoder per address family, in the default
    /// order (IPv4 then IPv6)
    pub async fn setup(&self) -> Result<()> {
        self.setup_families(&AddressFamily::ALL).await
    }

    /// Provision and open one decoder per given address family, in order
    ///
    /// Callable at most once per engine instance; a second call fails with
    /// [`GeoError::AlreadyPopulated`] instead of silently re-provisioning.
    /// Any per-family failure aborts the whole setup and leaves the engine
    /// empty; there is no partial engine with only some decoders.
    pub async fn setup_families(&self, families: &[AddressFamily]) -> Result<()> {
        self.state
            .compare_exchange(
                STATE_EMPTY,
                STATE_POPULATING,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map_err(|_| GeoError::AlreadyPopulated)?;

        match self.populate(families).await {
            Ok(populated) => {
                match self.inner.write() {
                    Ok(mut inner) => *inner = populated,
                    Err(e) => {
                        self.state.store(STATE_EMPTY, Ordering::SeqCst);
                        return Err(GeoError::other(format!(
                            "failed to acquire write lock: {}",
                            e
                        )));
                    }
                }
                self.state.store(STATE_POPULATED, Ordering::SeqCst);
                log::info!("Lookup engine populated with {} decoder(s)", families.len());
                Ok(())
            }
            Err(e) => {
                self.state.store(STATE_EMPTY, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn populate(&self, families: &[AddressFamily]) -> Result<EngineInner> {
        let force_refresh = self.force_refresh.load(Ordering::SeqCst);
        let mut populated = EngineInner::default();

        for family in families {
            let descriptor = self.settings.descriptor(*family);
            log::info!(
                "Setting up {} database '{}'",
                family,
                descriptor.name
            );

            let provisioned = provision(
                &descriptor,
                self.store.as_ref(),
                self.fetcher.as_ref(),
                force_refresh,
                self.should_persist,
            )
            .await?;

            // The temporary file (if any) is deleted when `provisioned`
            // drops, whether or not the open succeeded
            let decoder = self
                .opener
                .open(provisioned.path(), self.settings.cache_mode)?;

            populated.databases.push(descriptor);
            populated.decoders.push(decoder);
        }

        Ok(populated)
    }

    /// Force a refresh of every database, then populate the engine
    ///
    /// The refresh decision has to be made before the first population, so
    /// this fails with [`GeoError::AlreadyPopulated`] on a non-empty engine.
    pub async fn force_update(&self) -> Result<()> {
        if self.state.load(Ordering::SeqCst) != STATE_EMPTY {
            return Err(GeoError::AlreadyPopulated);
        }
        self.force_refresh.store(true, Ordering::SeqCst);
        self.setup().await
    }

    /// Resolve geographic metadata for an address
    ///
    /// The address is normalized by taking the substring before the first
    /// comma and trimming whitespace, which handles proxy-chain header values
    /// listing several addresses. Decoders are tried in setup order and the
    /// first record wins; a decoder that cannot resolve the address is an
    /// expected outcome (an IPv6 address handed to an IPv4 database, say) and
    /// is skipped. Never fails: the worst case is an empty record.
    pub fn lookup(&self, address: &str) -> GeoRecord {
        let normalized = address.split(',').next().unwrap_or("").trim();
        let Ok(ip) = normalized.parse::<std::net::IpAddr>() else {
            return GeoRecord::default();
        };

        let Ok(inner) = self.inner.read() else {
            return GeoRecord::default();
        };

        for decoder in &inner.decoders {
            match decoder.lookup(ip) {
                Ok(Some(record)) => return record,
                Ok(None) => continue,
                Err(e) => {
                    log::debug!("decoder skipped for {}: {}", ip, e);
                    continue;
                }
            }
        }

        GeoRecord::default()
    }

    /// Descriptors of the databases the engine was populated from
    pub fn databases(&self) -> Vec<DatabaseDescriptor> {
        self.inner
            .read()
            .map(|inner| inner.databases.clone())
            .unwrap_or_default()
    }

    /// Number of decoders currently held
    pub fn decoder_count(&self) -> usize {
        self.inner
            .read()
            .map(|inner| inner.decoders.len())
            .unwrap_or(0)
    }

    /// True once a population has completed
    pub fn is_populated(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_POPULATED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseSettings, DatabaseSource, Settings};
    use crate::engine::types::CacheMode;
    use crate::store::MemoryBlobStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::io::Write;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tempfile::NamedTempFile;

    #[derive(Clone)]
    enum StubBehavior {
        Record(GeoRecord),
        Miss,
        Fail,
    }

    struct StubDecoder {
        behavior: StubBehavior,
    }

    impl Decoder for StubDecoder {
        fn lookup(&self, _ip: std::net::IpAddr) -> Result<Option<GeoRecord>> {
            match &self.behavior {
                StubBehavior::Record(record) => Ok(Some(record.clone())),
                StubBehavior::Miss => Ok(None),
                StubBehavior::Fail => Err(GeoError::decode("broken decoder")),
            }
        }
    }

    enum OpenPlan {
        Decoder(StubBehavior),
        Fail,
    }

    struct StubOpener {
        plan: Mutex<VecDeque<OpenPlan>>,
    }

    impl StubOpener {
        fn new(plan: Vec<OpenPlan>) -> Self {
            Self {
                plan: Mutex::new(plan.into()),
            }
        }
    }

    impl DecoderOpener for StubOpener {
        fn open(&self, _path: &Path, _cache_mode: CacheMode) -> Result<Box<dyn Decoder>> {
            match self.plan.lock().unwrap().pop_front() {
                Some(OpenPlan::Decoder(behavior)) => Ok(Box::new(StubDecoder { behavior })),
                Some(OpenPlan::Fail) => Err(GeoError::decode("corrupt database file")),
                None => Ok(Box::new(StubDecoder {
                    behavior: StubBehavior::Miss,
                })),
            }
        }
    }

    struct CountingFetcher {
        payload: Vec<u8>,
        fetches: AtomicUsize,
    }

    impl CountingFetcher {
        fn new(payload: &[u8]) -> Self {
            Self {
                payload: payload.to_vec(),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SourceFetcher for CountingFetcher {
        async fn fetch(&self, _url: &str, _decompress: bool) -> Result<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.payload.clone())
        }
    }

    fn source(name: &str, path: &Path) -> DatabaseSource {
        DatabaseSource {
            name: name.to_string(),
            path: path.to_path_buf(),
            url: format!("https://example.com/{}.dat.gz", name),
        }
    }

    fn settings_with_paths(ip4: &Path, ip6: &Path) -> Settings {
        Settings {
            databases: DatabaseSettings {
                ip4: source("GeoLiteCity", ip4),
                ip6: source("GeoLiteCityv6", ip6),
            },
            setup_clients: true,
            cache_mode: CacheMode::Memory,
            store_path: None,
        }
    }

    fn record_with_city(city: &str) -> GeoRecord {
        GeoRecord {
            city: Some(city.to_string()),
            ..Default::default()
        }
    }

    /// Engine whose databases exist as local files, so provisioning never
    /// touches the store or the network
    fn local_engine(plan: Vec<OpenPlan>) -> (LookupEngine, Vec<NamedTempFile>) {
        let mut ip4 = NamedTempFile::new().unwrap();
        ip4.write_all(b"ip4 db").unwrap();
        let mut ip6 = NamedTempFile::new().unwrap();
        ip6.write_all(b"ip6 db").unwrap();

        let engine = LookupEngine::with_components(
            settings_with_paths(ip4.path(), ip6.path()),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(CountingFetcher::new(b"unused")),
            Box::new(StubOpener::new(plan)),
            false,
        );
        (engine, vec![ip4, ip6])
    }

    #[tokio::test]
    async fn test_setup_populates_one_decoder_per_family() {
        let (engine, _files) = local_engine(vec![
            OpenPlan::Decoder(StubBehavior::Miss),
            OpenPlan::Decoder(StubBehavior::Miss),
        ]);

        engine.setup().await.unwrap();

        assert!(engine.is_populated());
        assert_eq!(engine.decoder_count(), 2);
        let databases = engine.databases();
        assert_eq!(databases.len(), 2);
        assert_eq!(databases[0].name, "GeoLiteCity");
        assert_eq!(databases[1].name, "GeoLiteCityv6");
    }

    #[tokio::test]
    async fn test_second_setup_fails_loudly() {
        let (engine, _files) = local_engine(vec![
            OpenPlan::Decoder(StubBehavior::Miss),
            OpenPlan::Decoder(StubBehavior::Miss),
        ]);

        engine.setup().await.unwrap();
        let result = engine.setup().await;

        assert!(matches!(result, Err(GeoError::AlreadyPopulated)));
        assert_eq!(engine.decoder_count(), 2);
    }

    #[tokio::test]
    async fn test_force_update_after_setup_fails() {
        let (engine, _files) = local_engine(vec![
            OpenPlan::Decoder(StubBehavior::Miss),
            OpenPlan::Decoder(StubBehavior::Miss),
        ]);

        engine.setup().await.unwrap();
        let result = engine.force_update().await;

        assert!(matches!(result, Err(GeoError::AlreadyPopulated)));
    }

    #[tokio::test]
    async fn test_first_success_wins_in_setup_order() {
        let (engine, _files) = local_engine(vec![
            OpenPlan::Decoder(StubBehavior::Fail),
            OpenPlan::Decoder(StubBehavior::Record(record_with_city("X"))),
        ]);
        engine.setup().await.unwrap();

        let record = engine.lookup("1.2.3.4");
        assert_eq!(record.city.as_deref(), Some("X"));
    }

    #[tokio::test]
    async fn test_decoder_miss_falls_through_to_next() {
        let (engine, _files) = local_engine(vec![
            OpenPlan::Decoder(StubBehavior::Miss),
            OpenPlan::Decoder(StubBehavior::Record(record_with_city("Fallback"))),
        ]);
        engine.setup().await.unwrap();

        let record = engine.lookup("2001:db8::1");
        assert_eq!(record.city.as_deref(), Some("Fallback"));
    }

    #[tokio::test]
    async fn test_proxy_chain_address_uses_first_segment() {
        let (engine, _files) = local_engine(vec![OpenPlan::Decoder(StubBehavior::Record(
            record_with_city("X"),
        ))]);
        engine.setup().await.unwrap();

        let chained = engine.lookup("1.2.3.4, 5.6.7.8");
        let plain = engine.lookup("1.2.3.4");
        assert_eq!(chained, plain);
        assert_eq!(chained.city.as_deref(), Some("X"));

        let padded = engine.lookup("  1.2.3.4  ");
        assert_eq!(padded, plain);
    }

    #[tokio::test]
    async fn test_lookup_never_fails() {
        let (engine, _files) = local_engine(vec![
            OpenPlan::Decoder(StubBehavior::Fail),
            OpenPlan::Decoder(StubBehavior::Fail),
        ]);

        // Before setup: no decoders at all
        assert!(engine.lookup("8.8.8.8").is_empty());

        engine.setup().await.unwrap();

        assert!(engine.lookup("").is_empty());
        assert!(engine.lookup("not an address").is_empty());
        assert!(engine.lookup(",,,").is_empty());
        // Every decoder fails: still just an empty record
        assert!(engine.lookup("8.8.8.8").is_empty());
    }

    #[tokio::test]
    async fn test_failed_setup_reverts_to_empty_and_allows_retry() {
        let (engine, _files) = local_engine(vec![
            OpenPlan::Fail,
            OpenPlan::Decoder(StubBehavior::Miss),
            OpenPlan::Decoder(StubBehavior::Miss),
        ]);

        let result = engine.setup().await;
        assert!(matches!(result, Err(GeoError::Decode(_))));
        assert!(!engine.is_populated());
        assert_eq!(engine.decoder_count(), 0);

        // The failed attempt released the lifecycle tag
        engine.setup().await.unwrap();
        assert_eq!(engine.decoder_count(), 2);
    }

    #[tokio::test]
    async fn test_zero_families_still_claims_the_engine() {
        let (engine, _files) = local_engine(vec![]);

        engine.setup_families(&[]).await.unwrap();

        assert!(engine.is_populated());
        assert_eq!(engine.decoder_count(), 0);
        assert!(engine.lookup("8.8.8.8").is_empty());
        // The guard holds even though the decoder list is empty
        assert!(matches!(
            engine.force_update().await,
            Err(GeoError::AlreadyPopulated)
        ));
    }

    #[tokio::test]
    async fn test_setup_from_empty_store_provisions_and_persists() {
        let store = Arc::new(MemoryBlobStore::new());
        let fetcher = Arc::new(CountingFetcher::new(b"downloaded db"));

        let engine = LookupEngine::with_components(
            settings_with_paths(
                Path::new("missing/GeoLiteCity.dat"),
                Path::new("missing/GeoLiteCityv6.dat"),
            ),
            store.clone(),
            fetcher.clone(),
            Box::new(StubOpener::new(vec![
                OpenPlan::Decoder(StubBehavior::Record(record_with_city("Mountain View"))),
                OpenPlan::Decoder(StubBehavior::Miss),
            ])),
            true,
        );

        engine.setup().await.unwrap();

        assert_eq!(engine.decoder_count(), 2);
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(store.len(), 2);

        let record = engine.lookup("64.233.161.99");
        assert_eq!(record.city.as_deref(), Some("Mountain View"));
    }

    #[tokio::test]
    async fn test_force_update_refetches_cached_blobs() {
        let store = Arc::new(MemoryBlobStore::new());
        for name in ["GeoLiteCity", "GeoLiteCityv6"] {
            let mut blob = store.create(name).await.unwrap();
            blob.content = b"stale".to_vec();
            store.persist(&blob).await.unwrap();
        }
        let fetcher = Arc::new(CountingFetcher::new(b"fresh"));

        let engine = LookupEngine::with_components(
            settings_with_paths(
                Path::new("missing/GeoLiteCity.dat"),
                Path::new("missing/GeoLiteCityv6.dat"),
            ),
            store.clone(),
            fetcher.clone(),
            Box::new(StubOpener::new(vec![
                OpenPlan::Decoder(StubBehavior::Miss),
                OpenPlan::Decoder(StubBehavior::Miss),
            ])),
            true,
        );

        engine.force_update().await.unwrap();

        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 2);
        let blob = store.get("GeoLiteCity").await.unwrap().unwrap();
        assert_eq!(blob.content, b"fresh");
        assert!(engine.is_populated());
    }

    #[tokio::test]
    async fn test_plain_setup_with_cached_blobs_fetches_nothing() {
        let store = Arc::new(MemoryBlobStore::new());
        for name in ["GeoLiteCity", "GeoLiteCityv6"] {
            let mut blob = store.create(name).await.unwrap();
            blob.content = b"cached".to_vec();
            store.persist(&blob).await.unwrap();
        }
        let fetcher = Arc::new(CountingFetcher::new(b"unused"));

        let engine = LookupEngine::with_components(
            settings_with_paths(
                Path::new("missing/GeoLiteCity.dat"),
                Path::new("missing/GeoLiteCityv6.dat"),
            ),
            store.clone(),
            fetcher.clone(),
            Box::new(StubOpener::new(vec![
                OpenPlan::Decoder(StubBehavior::Miss),
                OpenPlan::Decoder(StubBehavior::Miss),
            ])),
            true,
        );

        engine.setup().await.unwrap();

        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(engine.decoder_count(), 2);
    }
}
