//! greyspf - Policy service entry point
//!
//! Reads policy requests on stdin and answers each with an `action=` line on
//! stdout. Logs go to stderr.

use anyhow::Result;
use greyspf_common::config::DEFAULT_CONFIG_FILE;
use greyspf_common::{Error, Verbosity};
use greyspf_core::{ConfigurationMap, PolicyService, RequestReader, Verdict, Whitelist};
use greyspf_storage::{DatabasePool, WhitelistRepository, WhitelistStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{self, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "Usage: greyspf [configfile]";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = match parse_args(std::env::args().skip(1)) {
        Some(path) => path,
        None => {
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    };

    let mut config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            // Logging goes to stderr, so this is the only report of the failure.
            init_logging(Verbosity::default());
            error!(code = e.code(), "{}", e);
            std::process::exit(1);
        }
    };

    init_logging(config.verbosity());
    info!(config = %config_path.display(), "Starting greyspf policy service");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database_settings()?)?;
    db_pool.migrate().await?;
    db_pool.health_check().await?;
    info!("Database connection established");

    let store = Arc::new(WhitelistRepository::new(db_pool));
    for which in Whitelist::ALL {
        store.ensure_unique(which.collection()).await?;
    }
    config.attach_store(store);

    let mut service = PolicyService::new(config);
    serve(&mut service).await?;

    info!("Input closed, shutting down");
    Ok(())
}

/// Config path from the command line, or `None` when usage was requested
fn parse_args(mut args: impl Iterator<Item = String>) -> Option<PathBuf> {
    match args.next() {
        Some(arg) if matches!(arg.as_str(), "-h" | "--help" | "-?") => None,
        Some(path) => Some(PathBuf::from(path)),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)),
    }
}

/// Defaults overlaid by the configuration source at `path`
fn load_config(path: &Path) -> greyspf_common::Result<ConfigurationMap> {
    ConfigurationMap::load(path, toml::Table::new())
}

async fn serve(service: &mut PolicyService) -> Result<()> {
    let mut reader = RequestReader::new(BufReader::new(io::stdin()));
    let mut stdout = io::stdout();

    loop {
        let verdict = match reader.next_request().await {
            Ok(Some(record)) => match service.evaluate(&record).await {
                Ok(verdict) => verdict,
                Err(e) => {
                    error!(code = e.code(), "Policy evaluation failed: {}", e);
                    Verdict::for_error(&e)
                }
            },
            Ok(None) => return Ok(()),
            Err(e @ Error::Parse(_)) => {
                warn!("{}", e);
                Verdict::for_error(&e)
            }
            Err(e) => return Err(e.into()),
        };

        stdout.write_all(verdict.response().as_bytes()).await?;
        stdout.flush().await?;
    }
}

fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .with(filter)
        .init();
}
