use std::collections::BTreeMap;
use std::future::Future;

use rowsync_config::shared::TableConfig;
use serde::{Deserialize, Serialize};

use crate::bail;
use crate::error::{ErrorKind, SyncResult};

/// Highest source row id known to be delivered for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(alias = "Table")]
    pub table_name: String,
    #[serde(alias = "Startid")]
    pub last_id: u64,
}

/// Trait for storing and retrieving table checkpoints.
///
/// Implementations keep an in-memory copy of every checkpoint, which is the source of truth for
/// reads, and write the complete set to their backing storage on every update. Updates from
/// different tables are serialized so that no write can drop another table's progress.
pub trait CheckpointStore {
    /// Loads the checkpoints from the backing storage into memory.
    ///
    /// Returns the number of loaded checkpoints.
    fn load(&self) -> impl Future<Output = SyncResult<usize>> + Send;

    /// Creates a checkpoint equal to `start_id` for every table that has none.
    ///
    /// Existing checkpoints are left untouched, so calling this twice is a no-op. The backing
    /// storage is written once if anything was added.
    fn initialize(&self, tables: &[TableConfig]) -> impl Future<Output = SyncResult<()>> + Send;

    /// Returns the checkpoint of a table, or 0 if the table has none.
    fn get_checkpoint(&self, table_name: &str) -> impl Future<Output = SyncResult<u64>> + Send;

    /// Sets the checkpoint of a table and persists the whole set.
    ///
    /// Moving a checkpoint backwards fails with [`ErrorKind::InvalidState`] and writes nothing.
    /// If persisting fails, the in-memory value has already been updated.
    fn set_and_persist(
        &self,
        table_name: &str,
        last_id: u64,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Returns a snapshot of all checkpoints ordered by table name.
    fn checkpoints(&self) -> impl Future<Output = SyncResult<BTreeMap<String, u64>>> + Send;
}

/// Adds the missing checkpoints of `tables` and returns whether anything was added.
pub(crate) fn add_missing(checkpoints: &mut BTreeMap<String, u64>, tables: &[TableConfig]) -> bool {
    let mut added = false;
    for table in tables {
        if !checkpoints.contains_key(&table.name) {
            checkpoints.insert(table.name.clone(), table.start_id);
            added = true;
        }
    }

    added
}

/// Updates the checkpoint of `table_name`, refusing to move it backwards.
pub(crate) fn advance(
    checkpoints: &mut BTreeMap<String, u64>,
    table_name: &str,
    last_id: u64,
) -> SyncResult<()> {
    let current = checkpoints.get(table_name).copied().unwrap_or(0);
    if last_id < current {
        bail!(
            ErrorKind::InvalidState,
            "Checkpoint moved backwards",
            format!("Checkpoint of table '{table_name}' can't go from {current} to {last_id}")
        );
    }

    checkpoints.insert(table_name.to_owned(), last_id);

    Ok(())
}
