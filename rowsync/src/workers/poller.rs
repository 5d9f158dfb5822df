use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use rowsync_config::shared::TableConfig;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, trace, warn};

use crate::checkpoint::CheckpointStore;
use crate::concurrency::shutdown::{ShutdownResult, ShutdownRx, is_shutdown_requested};
use crate::delivery::{DeliveryReport, deliver};
use crate::destination::Destination;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::metrics::{
    DESTINATION_LABEL, ERROR_KIND_LABEL, ROWSYNC_BATCHES_DELIVERED_TOTAL, ROWSYNC_CHECKPOINT,
    ROWSYNC_POLL_CYCLE_DURATION_SECONDS, ROWSYNC_POLL_CYCLES_TOTAL, ROWSYNC_POLLER_ERRORS_TOTAL,
    ROWSYNC_ROWS_DELIVERED_TOTAL, ROWSYNC_ROWS_EXTRACTED_TOTAL, TABLE_NAME_LABEL,
};
use crate::source::{ExtractionWindow, Extractor};
use crate::sync_error;
use crate::workers::base::{Worker, WorkerHandle};

/// Phase of a [`TablePoller`].
///
/// A poller cycles through `Extracting → Delivering → Checkpointing → Sleeping` and ends in
/// either [`PollerPhase::Failed`] or [`PollerPhase::Stopped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollerPhase {
    /// Created but not yet running.
    Idle,
    /// Reading the checkpoint and running the ranged query.
    Extracting,
    /// Writing the extracted records to the destination.
    Delivering,
    /// Persisting the new checkpoint.
    Checkpointing,
    /// Waiting for the next cycle.
    Sleeping,
    /// Stopped because of an error. Terminal.
    Failed,
    /// Stopped because shutdown was requested. Terminal.
    Stopped,
}

impl PollerPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollerPhase::Failed | PollerPhase::Stopped)
    }
}

impl fmt::Display for PollerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PollerPhase::Idle => "idle",
            PollerPhase::Extracting => "extracting",
            PollerPhase::Delivering => "delivering",
            PollerPhase::Checkpointing => "checkpointing",
            PollerPhase::Sleeping => "sleeping",
            PollerPhase::Failed => "failed",
            PollerPhase::Stopped => "stopped",
        };

        f.write_str(name)
    }
}

/// Internal state of [`PollerState`].
#[derive(Debug)]
struct PollerStateInner {
    table_name: String,
    phase: PollerPhase,
    /// Checkpoint persisted by the last completed cycle.
    last_checkpoint: Option<u64>,
    /// Notified on every phase change.
    phase_change: Arc<Notify>,
}

impl PollerStateInner {
    fn set_phase(&mut self, phase: PollerPhase) {
        trace!(
            table = %self.table_name,
            from_phase = %self.phase,
            to_phase = %phase,
            "poller phase changing"
        );

        self.phase = phase;

        // Only active listeners are woken up, no permit is stored for future ones.
        self.phase_change.notify_waiters();
    }
}

/// Shared, observable state of a [`TablePoller`].
///
/// Cloning the state is cheap and every clone observes the same poller.
#[derive(Debug, Clone)]
pub struct PollerState {
    inner: Arc<Mutex<PollerStateInner>>,
}

impl PollerState {
    fn new(table_name: String) -> Self {
        let inner = PollerStateInner {
            table_name,
            phase: PollerPhase::Idle,
            last_checkpoint: None,
            phase_change: Arc::new(Notify::new()),
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub async fn phase(&self) -> PollerPhase {
        self.inner.lock().await.phase
    }

    /// Returns the checkpoint persisted by the last completed cycle, if any cycle completed.
    pub async fn last_checkpoint(&self) -> Option<u64> {
        self.inner.lock().await.last_checkpoint
    }

    async fn set_phase(&self, phase: PollerPhase) {
        self.inner.lock().await.set_phase(phase);
    }

    async fn set_last_checkpoint(&self, last_checkpoint: u64) {
        self.inner.lock().await.last_checkpoint = Some(last_checkpoint);
    }

    /// Waits until the poller reaches one of `phases` and returns the reached phase.
    ///
    /// Returns early with the terminal phase if the poller terminates in a phase that is not
    /// among `phases`, since it will never change again.
    pub async fn wait_for_phase(&self, phases: &[PollerPhase]) -> PollerPhase {
        loop {
            let inner = self.inner.lock().await;

            let current_phase = inner.phase;
            if phases.contains(&current_phase) || current_phase.is_terminal() {
                return current_phase;
            }

            // We create the notified future while holding the lock, otherwise a change happening
            // between the unlock and the wait would be missed.
            let phase_change = inner.phase_change.clone();
            let phase_change_notified = phase_change.notified();

            drop(inner);

            phase_change_notified.await;
        }
    }
}

/// Summary of one completed poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Window that was requested from the source.
    pub window: ExtractionWindow,
    /// Number of rows returned by the source.
    pub rows: usize,
    /// Batches written to the destination.
    pub delivery: DeliveryReport,
    /// Checkpoint persisted at the end of the cycle.
    pub checkpoint: u64,
}

/// Worker that incrementally polls one table.
///
/// Every cycle extracts the window starting at the table's checkpoint, delivers the returned
/// records and only then moves the checkpoint to the highest delivered id. A failing cycle
/// leaves the checkpoint untouched and terminates the poller, so that a restart retries the same
/// window.
///
/// Shutdown is honoured before extracting, before delivering and while sleeping. Records that
/// were already delivered are always checkpointed before the poller stops.
#[derive(Debug)]
pub struct TablePoller<S, E, D> {
    table: Arc<TableConfig>,
    store: S,
    extractor: E,
    destination: D,
    shutdown_rx: ShutdownRx,
    state: PollerState,
}

impl<S, E, D> TablePoller<S, E, D>
where
    S: CheckpointStore + Send + Sync + 'static,
    E: Extractor + Send + Sync + 'static,
    D: Destination + Send + Sync + 'static,
{
    pub fn new(
        table: TableConfig,
        store: S,
        extractor: E,
        destination: D,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        let state = PollerState::new(table.name.clone());

        Self {
            table: Arc::new(table),
            store,
            extractor,
            destination,
            shutdown_rx,
            state,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state.clone()
    }

    /// Runs a single poll cycle without sleeping afterwards.
    ///
    /// Returns [`ShutdownResult::Shutdown`] if shutdown was requested before the cycle could
    /// deliver anything. On error the checkpoint is left as it was, unless persisting it failed.
    pub async fn run_cycle(&mut self) -> SyncResult<ShutdownResult<CycleReport, ()>> {
        let table_name = self.table.name.as_str();

        if is_shutdown_requested(&self.shutdown_rx) {
            return Ok(ShutdownResult::Shutdown(()));
        }

        let started_at = Instant::now();

        self.state.set_phase(PollerPhase::Extracting).await;
        let start_id = self.store.get_checkpoint(table_name).await?;
        let window = ExtractionWindow::new(table_name, start_id, self.table.input_rows_per_window);
        let extraction = self.extractor.extract(&self.table, &window).await?;

        counter!(
            ROWSYNC_ROWS_EXTRACTED_TOTAL,
            TABLE_NAME_LABEL => self.table.name.clone(),
        )
        .increment(extraction.len() as u64);

        let delivery = if extraction.is_empty() {
            debug!(
                table = table_name,
                start_id = window.start_id,
                end_id = window.end_id,
                "no new rows in window"
            );

            DeliveryReport::default()
        } else {
            if is_shutdown_requested(&self.shutdown_rx) {
                info!(
                    table = table_name,
                    rows = extraction.len(),
                    "shutdown requested, dropping extracted rows"
                );

                return Ok(ShutdownResult::Shutdown(()));
            }

            self.state.set_phase(PollerPhase::Delivering).await;
            let delivery = deliver(
                &self.destination,
                &extraction.records,
                self.table.output_rows_per_batch,
            )
            .await?;

            counter!(
                ROWSYNC_ROWS_DELIVERED_TOTAL,
                TABLE_NAME_LABEL => self.table.name.clone(),
                DESTINATION_LABEL => D::name(),
            )
            .increment(delivery.records as u64);
            counter!(
                ROWSYNC_BATCHES_DELIVERED_TOTAL,
                TABLE_NAME_LABEL => self.table.name.clone(),
                DESTINATION_LABEL => D::name(),
            )
            .increment(delivery.batches as u64);

            if extraction.max_id_seen == 0 {
                warn!(
                    table = table_name,
                    rows = extraction.len(),
                    "delivered rows all reported id 0, the checkpoint can't advance"
                );
            }

            delivery
        };

        // The checkpoint never moves backwards even if the query returned only old ids.
        let checkpoint = start_id.max(extraction.max_id_seen);

        self.state.set_phase(PollerPhase::Checkpointing).await;
        self.store.set_and_persist(table_name, checkpoint).await?;
        self.state.set_last_checkpoint(checkpoint).await;

        gauge!(ROWSYNC_CHECKPOINT, TABLE_NAME_LABEL => self.table.name.clone())
            .set(checkpoint as f64);
        counter!(ROWSYNC_POLL_CYCLES_TOTAL, TABLE_NAME_LABEL => self.table.name.clone())
            .increment(1);
        histogram!(
            ROWSYNC_POLL_CYCLE_DURATION_SECONDS,
            TABLE_NAME_LABEL => self.table.name.clone(),
        )
        .record(started_at.elapsed().as_secs_f64());

        if delivery.records > 0 {
            info!(
                table = table_name,
                rows = delivery.records,
                batches = delivery.batches,
                checkpoint,
                "delivered rows"
            );
        }

        trace!(
            table = table_name,
            start_id = window.start_id,
            end_id = window.end_id,
            rows = extraction.len(),
            checkpoint,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "poll cycle completed"
        );

        Ok(ShutdownResult::Ok(CycleReport {
            window,
            rows: extraction.len(),
            delivery,
            checkpoint,
        }))
    }

    /// Sleeps for the table's interval unless shutdown is requested first.
    async fn sleep(&mut self) -> ShutdownResult<(), ()> {
        self.state.set_phase(PollerPhase::Sleeping).await;

        tokio::select! {
            biased;

            _ = self.shutdown_rx.changed() => ShutdownResult::Shutdown(()),
            _ = tokio::time::sleep(self.table.interval()) => ShutdownResult::Ok(()),
        }
    }

    async fn poll_loop(&mut self) -> SyncResult<()> {
        loop {
            if self.run_cycle().await?.should_shutdown() {
                return Ok(());
            }

            if self.sleep().await.should_shutdown() {
                return Ok(());
            }
        }
    }

    async fn run(mut self) -> SyncResult<()> {
        let result = self.poll_loop().await;

        match &result {
            Ok(()) => {
                self.state.set_phase(PollerPhase::Stopped).await;

                info!(table = %self.table.name, "table poller stopped");
            }
            Err(err) => {
                self.state.set_phase(PollerPhase::Failed).await;

                error!(table = %self.table.name, error = %err, "table poller failed");
                record_poller_error(&self.table.name, err.kind());
            }
        }

        result
    }
}

impl<S, E, D> Worker<TablePollerHandle, PollerState> for TablePoller<S, E, D>
where
    S: CheckpointStore + Send + Sync + 'static,
    E: Extractor + Send + Sync + 'static,
    D: Destination + Send + Sync + 'static,
{
    type Error = SyncError;

    async fn start(self) -> SyncResult<TablePollerHandle> {
        info!(
            table = %self.table.name,
            interval_secs = self.table.interval_secs,
            window = self.table.input_rows_per_window,
            batch = self.table.output_rows_per_batch,
            "starting table poller"
        );

        let table_name = self.table.name.clone();
        let state = self.state.clone();

        let span = tracing::info_span!("table_poller", table = %table_name);
        let handle = tokio::spawn(self.run().instrument(span));

        Ok(TablePollerHandle {
            table_name,
            state,
            handle,
        })
    }
}

/// Handle to a running [`TablePoller`].
#[derive(Debug)]
pub struct TablePollerHandle {
    table_name: String,
    state: PollerState,
    handle: JoinHandle<SyncResult<()>>,
}

impl TablePollerHandle {
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl WorkerHandle<PollerState> for TablePollerHandle {
    fn state(&self) -> PollerState {
        self.state.clone()
    }

    async fn wait(self) -> SyncResult<()> {
        let TablePollerHandle {
            table_name,
            state,
            handle,
        } = self;

        match handle.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => {
                debug!(table = %table_name, "table poller task was cancelled");

                Ok(())
            }
            Err(err) => {
                // A panicking poller couldn't report itself, so it's reported here.
                state.set_phase(PollerPhase::Failed).await;

                error!(table = %table_name, error = %err, "table poller panicked");
                record_poller_error(&table_name, ErrorKind::PollerPanic);

                Err(sync_error!(
                    ErrorKind::PollerPanic,
                    "Table poller panicked",
                    format!("Poller of table '{table_name}' panicked: {err}")
                ))
            }
        }
    }
}

fn record_poller_error(table_name: &str, kind: ErrorKind) {
    counter!(
        ROWSYNC_POLLER_ERRORS_TOTAL,
        TABLE_NAME_LABEL => table_name.to_owned(),
        ERROR_KIND_LABEL => format!("{kind:?}"),
    )
    .increment(1);
}
