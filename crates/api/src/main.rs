//! Water Quality Monitor - Main Entry Point

use api::{config::AppConfig, init_logging, run};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Polls a turbidity/temperature sensor and serves the readings over HTTP
#[derive(Parser, Debug)]
#[command(name = "water-monitor", version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file (optional)
    #[arg(short, long, default_value = "water-monitor.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(Some(&cli.config))?;

    init_logging(&config.log).map_err(|e| anyhow::anyhow!("initializing logging: {}", e))?;

    info!("=== Water Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", cli.config.display());

    run(config).await
}
