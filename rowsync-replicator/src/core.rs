use rowsync::checkpoint::file::FileCheckpointStore;
use rowsync::concurrency::shutdown::ShutdownTx;
use rowsync::destination::influxdb::InfluxDbDestination;
use rowsync::orchestrator::Orchestrator;
use rowsync::source::sql::SqlExtractor;
use rowsync_config::shared::{ReplicatorConfig, ReplicatorConfigWithoutSecrets};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ReplicatorResult;

/// Builds the checkpoint store, extractor and destination from `config` and polls until every
/// poller terminated.
pub async fn start_replicator_with_config(config: ReplicatorConfig) -> ReplicatorResult<()> {
    info!("starting replicator service");

    log_config(&config);

    let store = FileCheckpointStore::new(config.checkpoint.path.clone());
    let extractor = SqlExtractor::from_config(&config.source);
    let destination = InfluxDbDestination::new(&config.sink)?;

    let mut orchestrator = Orchestrator::new(config.tables, store, extractor, destination);
    orchestrator.start().await?;

    let shutdown_handle = spawn_shutdown_listener(orchestrator.shutdown_tx());

    let result = orchestrator.wait().await;

    // The pollers may all have failed before any signal arrived.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    result?;

    info!("replicator service completed");

    Ok(())
}

fn log_config(config: &ReplicatorConfig) {
    let config = ReplicatorConfigWithoutSecrets::from(config.clone());

    match serde_json::to_string(&config) {
        Ok(rendered) => debug!(config = %rendered, "replicator config"),
        Err(err) => warn!(error = %err, "failed to render replicator config"),
    }

    for table in &config.tables {
        info!(
            table = %table.name,
            active = table.active,
            interval_secs = table.interval_secs,
            window = table.input_rows_per_window,
            batch = table.output_rows_per_batch,
            "configured table"
        );
    }
}

/// Spawns a task that requests shutdown on SIGINT or SIGTERM.
fn spawn_shutdown_listener(shutdown_tx: ShutdownTx) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;

        if let Err(err) = shutdown_tx.shutdown() {
            warn!(error = ?err, "failed to send shutdown signal");
            return;
        }

        info!("shutdown signal sent to all pollers");
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            warn!(error = %err, "failed to register sigterm handler, only sigint is handled");

            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = wait_for_ctrl_c() => {}
        _ = sigterm.recv() => {
            info!("sigterm received, shutting down pollers");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("sigint (ctrl+c) received, shutting down pollers"),
        Err(err) => {
            // Without a handler we can't ever be interrupted, so we keep waiting forever.
            warn!(error = %err, "failed to listen for sigint");
            std::future::pending::<()>().await;
        }
    }
}
