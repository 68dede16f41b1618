//! Margin-funding lending bot - entry point.
//!
//! Observation mode computes and logs every plan without touching the
//! account. Trading mode manages offers live and needs API credentials.

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use lendbot_bot::config::{API_KEY_ENV, API_SECRET_ENV};
use lendbot_bot::{AppConfig, Application};
use lendbot_exchange::BitfinexClient;
use tracing::{info, warn};

/// Margin-funding lending bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via LENDBOT_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Run one strategy pass and one opportunistic pass, then exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    lendbot_telemetry::init_logging()?;

    info!("Starting lendbot v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > LENDBOT_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("LENDBOT_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = AppConfig::from_file(&config_path)?;
    info!(
        mode = ?config.mode,
        currencies = config.currencies.len(),
        "Configuration loaded"
    );

    let credentials = AppConfig::credentials_from_env();
    if credentials.is_none() {
        if !config.is_observation_mode() {
            bail!("trading mode requires {API_KEY_ENV} and {API_SECRET_ENV}");
        }
        warn!("No API credentials; account reads will fail and be logged");
    }

    let client = BitfinexClient::new(config.exchange.clone(), credentials)?;
    let app = Application::new(config, Arc::new(client))?;

    if args.once {
        app.run_once().await?;
    } else {
        app.run().await?;
    }

    Ok(())
}
