//! Filesweep ingestion daemon.
//!
//! Sweeps a directory for dropped files, decodes them record by record,
//! and prints decoded events as JSON lines on stdout.
//!
//! Usage:
//!     filesweep --config sweep.toml

use clap::Parser;
use filesweep::{JsonLinesSink, SweepConfig, SweepLoop};
use filesweep_logging::LogConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "filesweep", about = "Directory-sweep file ingestion engine")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long)]
    config: PathBuf,

    /// Log at the configured filter level on stderr instead of warn-only
    #[arg(long)]
    verbose: bool,

    /// Directory for the rolling log file (disabled when omitted)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let _log_guard = filesweep_logging::init_logging(LogConfig {
        app_name: "filesweep",
        verbose: args.verbose,
        log_dir: args.log_dir.clone(),
    })?;

    let config = SweepConfig::load(&args.config)?;
    let decoder = config.decoder.build()?;
    let sink = Box::new(JsonLinesSink::new(std::io::stdout()));

    tracing::info!(
        pattern = %config.pattern,
        interval_secs = config.scan_interval_secs,
        "starting filesweep"
    );

    let handle = SweepLoop::new(config, decoder, sink).spawn()?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested; finishing in-flight tick");
    tokio::task::spawn_blocking(move || handle.shutdown()).await?;

    Ok(())
}
