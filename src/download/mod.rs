//! Database source downloader
//!
//! Handles fetching database payloads from remote sources, with gzip
//! decompression for `.gz` sources. Provisioning talks to this module through
//! the [`SourceFetcher`] trait so tests can substitute canned payloads.

use crate::error::{GeoError, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Read;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Fetches raw database bytes from a source URL
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch the payload at `url`, gunzipping it when `decompress` is set
    async fn fetch(&self, url: &str, decompress: bool) -> Result<Vec<u8>>;
}

/// HTTP downloader
///
/// Downloads database payloads with a request timeout and an optional
/// progress bar for interactive use.
pub struct Downloader {
    client: reqwest::Client,
    show_progress: bool,
}

impl Downloader {
    /// Create a new downloader without progress display
    pub fn new() -> Result<Self> {
        Self::build(false)
    }

    /// Create a downloader that renders a progress bar while fetching
    pub fn with_progress() -> Result<Self> {
        Self::build(true)
    }

    fn build(show_progress: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("geolookup/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| GeoError::network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            show_progress,
        })
    }

    /// Stream the response body into memory
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        log::info!("Downloading from: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GeoError::network(format!("failed to send request: {}", e)))?;

        if !response.status().is_success() {
            return Err(GeoError::download(format!(
                "HTTP error: {} - {}",
                response.status(),
                url
            )));
        }

        let total_size = response.content_length();

        let pb = if self.show_progress && total_size.is_some() {
            let pb = ProgressBar::new(total_size.unwrap());
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            pb.set_message(format!(
                "Downloading {}",
                url.split('/').next_back().unwrap_or("database")
            ));
            Some(pb)
        } else {
            None
        };

        let mut stream = response.bytes_stream();
        let mut payload = match total_size {
            Some(len) => Vec::with_capacity(len as usize),
            None => Vec::new(),
        };

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| GeoError::network(format!("failed to read chunk: {}", e)))?;
            payload.extend_from_slice(&chunk);
            if let Some(ref pb) = pb {
                pb.set_position(payload.len() as u64);
            }
        }

        if let Some(pb) = pb {
            pb.finish_with_message(format!("Downloaded {} bytes", payload.len()));
        }

        log::info!("Downloaded {} bytes from {}", payload.len(), url);
        Ok(payload)
    }
}

#[async_trait]
impl SourceFetcher for Downloader {
    async fn fetch(&self, url: &str, decompress: bool) -> Result<Vec<u8>> {
        let payload = self.fetch_bytes(url).await?;
        if decompress {
            gunzip(&payload)
        } else {
            Ok(payload)
        }
    }
}

/// Decompress a gzip payload
pub(crate) fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| GeoError::decompress(format!("gunzip failed: {}", e)))?;
    Ok(decompressed)
}
