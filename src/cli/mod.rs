//! CLI module for geolookup
//!
//! Handles command line argument parsing, ad-hoc lookups, and the one-shot
//! database refresh used by operators and cron jobs.

use crate::config::Settings;
use crate::download::Downloader;
use crate::engine::{DecoderFactory, GeoRecord, LookupEngine};
use crate::error::{GeoError, Result};
use crate::store::SqliteBlobStore;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "geolookup")]
#[command(version, about = "Look up geographic metadata for IP addresses using locally-cached databases")]
#[command(long_about = "geolookup resolves IP addresses to approximate geographic metadata\n\
    using locally-cached binary geolocation databases. Databases are taken from\n\
    the local filesystem when shipped with the deployment, from the durable\n\
    blob cache otherwise, and downloaded from their source URLs on first use.\n\n\
    Examples:\n  \
    $ geolookup 64.233.161.99\n  \
    $ geolookup --json 64.233.161.99 2001:db8::1\n  \
    $ geolookup --update")]
pub struct Cli {
    /// IP addresses to look up
    #[arg(value_name = "ADDRESS")]
    pub queries: Vec<String>,

    /// Output JSON format
    #[arg(short, long)]
    pub json: bool,

    /// Force-refresh all cached databases, then exit
    #[arg(long)]
    pub update: bool,

    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub async fn run(&self, settings: Settings) -> Result<()> {
        // Handle the refresh command first; it never serves lookups
        if self.update {
            return self.handle_update(settings).await;
        }

        if self.queries.is_empty() {
            return Err(GeoError::config(
                "no addresses given; run with --help for usage",
            ));
        }

        let engine = crate::init_engine(settings).await?;

        for query in &self.queries {
            let record = engine.lookup(query);
            if self.json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else if record.is_empty() {
                println!("{} -> [not found]", query);
            } else {
                println!("{} -> {}", query, format_record(&record));
            }
        }

        Ok(())
    }

    /// Force-refresh every configured database
    ///
    /// Operates on its own freshly built engine with persistence enabled; the
    /// long-lived serving engine picks the new data up from the blob store on
    /// its next setup. No retries: a failure propagates to the exit status
    /// and the operator runs the command again.
    async fn handle_update(&self, settings: Settings) -> Result<()> {
        let store = Arc::new(SqliteBlobStore::open(settings.resolve_store_path()?).await?);
        let engine = LookupEngine::with_components(
            settings,
            store,
            Arc::new(Downloader::with_progress()?),
            Box::new(DecoderFactory),
            true,
        );

        engine.force_update().await?;

        println!("✓ Refreshed {} database(s)", engine.decoder_count());
        Ok(())
    }
}

/// Compact single-line rendering of a record
fn format_record(record: &GeoRecord) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(city) = &record.city {
        parts.push(city.clone());
    }
    if let Some(region) = &record.region {
        parts.push(region.clone());
    }
    if let Some(country) = record.country_name.as_ref().or(record.country_code.as_ref()) {
        parts.push(country.clone());
    }
    let mut line = parts.join(", ");
    if let (Some(lat), Some(lon)) = (record.latitude, record.longitude) {
        if line.is_empty() {
            line = format!("({:.4}, {:.4})", lat, lon);
        } else {
            line = format!("{} ({:.4}, {:.4})", line, lat, lon);
        }
    }
    line
}
