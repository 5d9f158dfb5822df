//! Rowsync replicator service binary.
//!
//! Polls the configured tables of a monitoring database and writes their rows to a time-series
//! store until interrupted with SIGINT or SIGTERM.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rowsync_config::shared::ReplicatorConfig;
use rowsync_telemetry::metrics::init_metrics;
use rowsync_telemetry::tracing::init_tracing;
use tracing::error;

use crate::config::load_replicator_config;
use crate::core::start_replicator_with_config;
use crate::error::{ReplicatorError, ReplicatorResult};

mod config;
mod core;
mod error;

/// Incrementally replicates monitoring tables into a time-series database.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path of the configuration file (toml, yaml or json).
    #[arg(long, env = "ROWSYNC_CONFIG")]
    config: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

/// Loads the configuration and initializes telemetry before starting the runtime.
fn run(args: Args) -> ReplicatorResult<()> {
    let replicator_config = load_replicator_config(&args.config)?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"), &replicator_config.logging)
        .map_err(ReplicatorError::config)?;

    // We start the runtime.
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(replicator_config))
}

async fn async_main(replicator_config: ReplicatorConfig) -> ReplicatorResult<()> {
    // The Prometheus listener needs a running runtime.
    init_metrics(replicator_config.metrics.as_ref()).map_err(ReplicatorError::config)?;

    if let Err(err) = start_replicator_with_config(replicator_config).await {
        error!("{err}");

        return Err(err);
    }

    Ok(())
}
