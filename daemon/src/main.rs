//! Tidemark daemon: entry point for running an orchestrator node.
//!
//! Production deployments plug real gateway backends in at the composition
//! root; this binary wires the in-memory collaborators, which is enough to
//! exercise the full workflow loop locally and in integration environments.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tidemark_gateways::SystemClock;
use tidemark_node::orchestrator::Gateways;
use tidemark_node::{init_logging, LogFormat, NodeConfig, TidemarkNode};
use tidemark_nullables::{NullBus, NullContentStore, NullLedger, NullProjectStore, NullRails};

#[derive(Parser)]
#[command(name = "tidemark-daemon", about = "Tidemark MRV orchestrator daemon")]
struct Cli {
    /// Path to a TOML configuration file. CLI flags override file values.
    #[arg(long, env = "TIDEMARK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "TIDEMARK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "TIDEMARK_LOG_FORMAT")]
    log_format: Option<String>,

    /// Enable Prometheus metrics registration.
    #[arg(long, env = "TIDEMARK_ENABLE_METRICS")]
    metrics: bool,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the orchestrator node until SIGINT/SIGTERM.
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(&path.display().to_string())?,
        None => NodeConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    config.enable_metrics = config.enable_metrics || cli.metrics;

    init_logging(LogFormat::parse(&config.log_format), &config.log_level);
    if let Some(path) = &cli.config {
        tracing::info!(config = %path.display(), "configuration loaded");
    }

    match cli.command {
        Command::Run => {
            let gateways = Gateways {
                ledger: Arc::new(NullLedger::new()),
                content: Arc::new(NullContentStore::new()),
                store: Arc::new(NullProjectStore::new()),
                bus: Arc::new(NullBus::new()),
                rails: Arc::new(NullRails::new()),
                clock: Arc::new(SystemClock),
            };

            let mut node = TidemarkNode::new(config, gateways);
            node.start().await?;
            tracing::info!("tidemark node running; press Ctrl-C to stop");

            let shutdown = Arc::clone(&node.shutdown);
            shutdown.wait_for_signal().await;
            node.stop().await?;
            tracing::info!("tidemark daemon exited cleanly");
        }
    }

    Ok(())
}
