use rowsync_config::shared::TableConfig;
use tracing::{error, info};

use crate::bail;
use crate::checkpoint::CheckpointStore;
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::destination::Destination;
use crate::error::{ErrorKind, SyncResult};
use crate::source::Extractor;
use crate::workers::base::Worker;
use crate::workers::poller::{PollerState, TablePoller};
use crate::workers::pool::PollerPool;

#[derive(Debug)]
enum OrchestratorState {
    NotStarted,
    Started { pool: PollerPool },
}

/// Runs one [`TablePoller`] per active table and coordinates their shutdown.
///
/// All pollers share the same checkpoint store, extractor and destination. The orchestrator
/// finishes once every poller terminated, either because shutdown was requested or because it
/// failed.
#[derive(Debug)]
pub struct Orchestrator<S, E, D> {
    tables: Vec<TableConfig>,
    store: S,
    extractor: E,
    destination: D,
    state: OrchestratorState,
    shutdown_tx: ShutdownTx,
}

impl<S, E, D> Orchestrator<S, E, D>
where
    S: CheckpointStore + Clone + Send + Sync + 'static,
    E: Extractor + Clone + Send + Sync + 'static,
    D: Destination + Clone + Send + Sync + 'static,
{
    pub fn new(tables: Vec<TableConfig>, store: S, extractor: E, destination: D) -> Self {
        // Receivers are obtained through `subscribe`, one per poller.
        let (shutdown_tx, _) = create_shutdown_channel();

        Self {
            tables,
            store,
            extractor,
            destination,
            state: OrchestratorState::NotStarted,
            shutdown_tx,
        }
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Loads the checkpoints and starts a poller for every active table.
    ///
    /// Every configured table gets a checkpoint, including inactive ones, so that activating a
    /// table later starts from its configured `start_id`.
    pub async fn start(&mut self) -> SyncResult<()> {
        let active_tables = self
            .tables
            .iter()
            .filter(|table| table.active)
            .cloned()
            .collect::<Vec<_>>();

        info!(
            tables = self.tables.len(),
            active_tables = active_tables.len(),
            destination = D::name(),
            "starting orchestrator"
        );

        if active_tables.is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "No active tables",
                "At least one table must be active to start polling"
            );
        }

        let loaded = self.store.load().await?;
        self.store.initialize(&self.tables).await?;

        info!(loaded, "checkpoints ready");

        let mut pool = PollerPool::new();
        for table in active_tables {
            let poller = TablePoller::new(
                table,
                self.store.clone(),
                self.extractor.clone(),
                self.destination.clone(),
                self.shutdown_tx.subscribe(),
            );

            pool.insert(poller.start().await?);
        }

        self.state = OrchestratorState::Started { pool };

        Ok(())
    }

    /// Returns the state of the poller of `table_name`, if it was started.
    pub fn poller_state(&self, table_name: &str) -> Option<PollerState> {
        match &self.state {
            OrchestratorState::NotStarted => None,
            OrchestratorState::Started { pool } => pool.state(table_name),
        }
    }

    /// Waits for every poller to terminate and returns their aggregated errors.
    pub async fn wait(self) -> SyncResult<()> {
        let OrchestratorState::Started { pool } = self.state else {
            info!("orchestrator was not started, nothing to wait for");

            return Ok(());
        };

        let mut errors = vec![];

        if let Err(err) = pool.wait_all().await {
            // We naively use the `kinds` as number of errors.
            let errors_number = err.kinds().len();
            errors.push(err);

            info!("{errors_number} table pollers failed with an error");
        }

        if let Err(err) = self.destination.shutdown().await {
            error!(error = %err, "failed to shut down destination");
            errors.push(err);
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        info!("all table pollers completed");

        Ok(())
    }

    /// Asks every poller to stop at its next phase boundary.
    pub fn shutdown(&self) {
        info!("trying to shut down the orchestrator");

        if let Err(err) = self.shutdown_tx.shutdown() {
            error!("failed to send shutdown signal to the pollers: {}", err);
            return;
        }

        info!("shut down signal successfully sent to all pollers");
    }

    pub async fn shutdown_and_wait(self) -> SyncResult<()> {
        self.shutdown();
        self.wait().await
    }
}
