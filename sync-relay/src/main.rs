//! sync-relay binary entry point.
//!
//! Usage:
//! ```bash
//! sync-relay --config relay.toml
//! sync-relay --help
//! ```

use anyhow::{Context, Result};
use cardset_sync_relay::http::{build_router, health};
use cardset_sync_relay::{CardSetRelay, Config, SqliteStore};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Reference store for cardset-sync.
#[derive(Parser, Debug)]
#[command(name = "sync-relay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults apply when it does not exist)
    #[arg(long, short, default_value = "relay.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Config::from_file(&cli.config)?
    } else {
        Config::default()
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if !cli.config.exists() {
        tracing::info!("No config at {}, using defaults", cli.config.display());
    }

    let store = SqliteStore::new(&config.storage.database)
        .await
        .with_context(|| format!("Failed to open {}", config.storage.database.display()))?;
    tracing::info!("Storage ready at {}", config.storage.database.display());

    let bind_address = config.server.bind_address.clone();
    let relay = Arc::new(CardSetRelay::new(config, store));
    health::init_start_time();

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    tracing::info!("sync-relay v{} listening on {}", env!("CARGO_PKG_VERSION"), bind_address);

    axum::serve(listener, build_router(relay))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("sync-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
