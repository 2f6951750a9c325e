//! Decoders and the factory that opens them
//!
//! A decoder wraps one loaded database file and resolves single addresses to
//! records. The shipped implementation reads MaxMind city databases; the
//! [`DecoderOpener`] seam lets tests and alternative formats substitute their
//! own decoders.

use crate::engine::types::{CacheMode, GeoRecord};
use crate::error::{GeoError, Result};
use maxminddb::{MaxMindDBError, Reader, geoip2};
use memmap2::Mmap;
use std::fs::File;
use std::net::IpAddr;
use std::path::Path;

/// Read-only lookup client for one database
///
/// Implementations must support unlimited concurrent readers. A lookup that
/// cannot resolve the address reports `Ok(None)`; only genuinely broken reads
/// return an error, and the engine treats both as "try the next decoder".
pub trait Decoder: Send + Sync {
    /// Resolve one address against this database
    fn lookup(&self, ip: IpAddr) -> Result<Option<GeoRecord>>;
}

/// Opens a database file as a [`Decoder`]
pub trait DecoderOpener: Send + Sync {
    /// Open the file at `path`, failing with a decode error when the file is
    /// not a valid database
    fn open(&self, path: &Path, cache_mode: CacheMode) -> Result<Box<dyn Decoder>>;
}

/// Factory for MaxMind-format city database decoders
pub struct DecoderFactory;

impl DecoderOpener for DecoderFactory {
    fn open(&self, path: &Path, cache_mode: CacheMode) -> Result<Box<dyn Decoder>> {
        log::info!(
            "Opening city database from {} ({:?} mode)",
            path.display(),
            cache_mode
        );
        match cache_mode {
            CacheMode::Memory => {
                let bytes = std::fs::read(path)?;
                let reader = Reader::from_source(bytes).map_err(open_err(path))?;
                Ok(Box::new(CityDecoder { reader }))
            }
            CacheMode::Mmap => {
                let file = File::open(path)?;
                // Safety: the provisioned file is not mutated while mapped
                let mmap = unsafe { Mmap::map(&file) }?;
                let reader = Reader::from_source(mmap).map_err(open_err(path))?;
                Ok(Box::new(CityDecoder { reader }))
            }
        }
    }
}

fn open_err(path: &Path) -> impl FnOnce(MaxMindDBError) -> GeoError {
    let path = path.to_path_buf();
    move |e| GeoError::decode(format!("failed to open database {}: {}", path.display(), e))
}

/// MaxMind city database decoder
struct CityDecoder<S: AsRef<[u8]>> {
    reader: Reader<S>,
}

impl<S: AsRef<[u8]> + Send + Sync> Decoder for CityDecoder<S> {
    fn lookup(&self, ip: IpAddr) -> Result<Option<GeoRecord>> {
        match self.reader.lookup::<geoip2::City>(ip) {
            Ok(city) => {
                let record = record_from_city(&city);
                // A subnet hit with no usable fields still counts as a miss
                Ok((!record.is_empty()).then_some(record))
            }
            Err(MaxMindDBError::AddressNotFoundError(_)) => Ok(None),
            Err(e) => Err(GeoError::decode(format!("city lookup error: {}", e))),
        }
    }
}

fn record_from_city(city: &geoip2::City) -> GeoRecord {
    let english = |names: &Option<std::collections::BTreeMap<&str, &str>>| {
        names
            .as_ref()
            .and_then(|n| n.get("en"))
            .map(|s| s.to_string())
    };

    GeoRecord {
        city: city.city.as_ref().and_then(|c| english(&c.names)),
        region: city
            .subdivisions
            .as_ref()
            .and_then(|subs| subs.first())
            .and_then(|sub| sub.iso_code)
            .map(|s| s.to_string()),
        postal_code: city
            .postal
            .as_ref()
            .and_then(|p| p.code)
            .map(|s| s.to_string()),
        latitude: city.location.as_ref().and_then(|l| l.latitude),
        longitude: city.location.as_ref().and_then(|l| l.longitude),
        country_code: city
            .country
            .as_ref()
            .and_then(|c| c.iso_code)
            .map(|s| s.to_string()),
        country_name: city.country.as_ref().and_then(|c| english(&c.names)),
        continent: city
            .continent
            .as_ref()
            .and_then(|c| c.code)
            .map(|s| s.to_string()),
        // Not carried by MaxMind city databases
        area_code: None,
        dma_code: city.location.as_ref().and_then(|l| l.metro_code),
    }
}
