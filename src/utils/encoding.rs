//! Character encoding utilities
//!
//! Forwarded-address headers arrive as raw bytes and are not guaranteed to be
//! valid UTF-8. Decoding tries UTF-8 first and falls back to windows-1252,
//! which maps every byte, so decoding never fails.

use encoding_rs::WINDOWS_1252;

/// Decode header bytes to text, trying UTF-8 then windows-1252
pub fn decode_header_text(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => {
            log::debug!("header bytes are not UTF-8, decoding as windows-1252");
            let (cow, _encoding_used, _had_errors) = WINDOWS_1252.decode(data);
            cow.into_owned()
        }
    }
}
