use std::collections::BTreeMap;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::workers::base::WorkerHandle;
use crate::workers::poller::{PollerState, TablePollerHandle};

/// Pool of running table pollers, one per table.
///
/// Pollers are independent: a failed poller stays down while the others keep running, and the
/// pool only reports failures once every poller terminated.
#[derive(Debug, Default)]
pub struct PollerPool {
    handles: BTreeMap<String, TablePollerHandle>,
}

impl PollerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a started poller to the pool.
    ///
    /// A running poller of the same table is never replaced. A finished one is.
    pub fn insert(&mut self, handle: TablePollerHandle) {
        let table_name = handle.table_name().to_owned();

        if let Some(existing) = self.handles.get(&table_name)
            && !existing.is_finished()
        {
            warn!(table = %table_name, "poller already exists in pool and is still running");

            return;
        }

        debug!(table = %table_name, "added poller to pool");
        self.handles.insert(table_name, handle);
    }

    /// Returns the state of the poller of `table_name`.
    pub fn state(&self, table_name: &str) -> Option<PollerState> {
        self.handles.get(table_name).map(|handle| handle.state())
    }

    /// Waits for every poller to terminate.
    ///
    /// Errors are aggregated in table name order. Pollers already logged their own failure, so
    /// nothing is logged here per error.
    pub async fn wait_all(self) -> SyncResult<()> {
        info!(pollers = self.handles.len(), "waiting for table pollers to complete");

        let results = join_all(self.handles.into_values().map(|handle| handle.wait())).await;
        let errors = results
            .into_iter()
            .filter_map(Result::err)
            .collect::<Vec<_>>();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }
}
