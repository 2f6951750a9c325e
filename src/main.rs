//! Main entry point for the geolookup CLI
//!
//! Thin wrapper around the library: parses arguments, initializes logging,
//! loads the configuration, and runs the requested command. Errors propagate
//! to the process exit status.

use clap::Parser;
use log::info;

use geolookup::Settings;
use geolookup::cli::Cli;

#[tokio::main]
async fn main() -> geolookup::Result<()> {
    // Initialize logging
    env_logger::init();

    // Parse command line arguments
    let cli = Cli::parse();

    info!("Starting geolookup v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (--config wins over GEOLOOKUP_CONFIG)
    let settings = Settings::load(cli.config.as_deref())?;

    cli.run(settings).await
}
