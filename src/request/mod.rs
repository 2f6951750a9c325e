//! Request-scoped helpers for host frameworks
//!
//! A serving process holds one populated [`LookupEngine`] and passes it to
//! request handlers explicitly. These helpers cover the per-request chores:
//! picking the caller's address out of an explicit override, a forwarding
//! header, or the transport-level remote address, then running the lookup.

use crate::engine::{GeoRecord, LookupEngine};
use crate::utils::encoding::decode_header_text;

/// Resolve the caller's address
///
/// Priority order: an explicitly supplied address, else the forwarding header
/// (raw bytes, decoded as UTF-8 with a windows-1252 fallback), else the
/// transport-level remote address. Forwarding headers may carry a
/// comma-separated proxy chain; [`LookupEngine::lookup`] normalizes that.
pub fn client_address(
    explicit: Option<&str>,
    forwarded_for: Option<&[u8]>,
    remote_addr: Option<&str>,
) -> Option<String> {
    if let Some(address) = explicit {
        return Some(address.to_string());
    }
    if let Some(header) = forwarded_for {
        return Some(decode_header_text(header));
    }
    remote_addr.map(str::to_string)
}

/// Look up geographic metadata for the calling client
///
/// Returns an empty record when no address can be resolved at all.
pub fn lookup_client(
    engine: &LookupEngine,
    explicit: Option<&str>,
    forwarded_for: Option<&[u8]>,
    remote_addr: Option<&str>,
) -> GeoRecord {
    match client_address(explicit, forwarded_for, remote_addr) {
        Some(address) => engine.lookup(&address),
        None => GeoRecord::default(),
    }
}
