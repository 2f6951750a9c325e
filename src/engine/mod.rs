//! Lookup engine for geolookup
//!
//! This module owns the full database lifecycle in front of lookups:
//! provisioning a usable local file per address family, opening a decoder
//! over it, and answering point lookups against the ordered decoders.
//!
//! # Module Organization
//!
//! - `types`: Common type definitions (AddressFamily, DatabaseDescriptor,
//!   CacheMode, GeoRecord)
//! - `decoder`: Decoder trait and the MaxMind-format factory
//! - `provision`: Filesystem-first database provisioning
//! - `lookup`: The engine itself

pub mod decoder;
pub mod lookup;
pub mod provision;
pub mod types;

// Re-export core types for convenience
pub use decoder::{Decoder, DecoderFactory, DecoderOpener};
pub use lookup::LookupEngine;
pub use provision::{ProvisionedDatabase, provision};
pub use types::{AddressFamily, CacheMode, DatabaseDescriptor, GeoRecord};
