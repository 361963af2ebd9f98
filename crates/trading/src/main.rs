//! riskgate binary
//!
//! Runs the risk-gated engine against the paper gateway. Loads configuration,
//! initializes tracing, and starts the [`TradingEngine`].

use std::path::PathBuf;

use clap::Parser;

use rg_core::config::AppConfig;
use rg_core::logging::SecretGuard;
use rg_trading::engine::TradingEngine;

/// Pre-trade risk gate for futures order flow.
#[derive(Parser, Debug)]
#[command(name = "riskgate", about = "Pre-trade risk gate")]
struct Args {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit JSON logs instead of the human-readable format.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(args.config)?;

    let guard = SecretGuard::new(config.control.token.clone());
    rg_core::logging::init_tracing(args.json_logs, guard);

    tracing::info!(
        gateway = %config.trading.gateway,
        plugins = ?config.plugins.enabled,
        settings = %config.settings.path.display(),
        "starting riskgate"
    );

    let engine = TradingEngine::new(config)?;
    engine.run().await
}
