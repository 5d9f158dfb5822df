use std::collections::BTreeMap;
use std::sync::Arc;

use rowsync_config::shared::TableConfig;
use tokio::sync::Mutex;

use crate::checkpoint::CheckpointStore;
use crate::checkpoint::base::{add_missing, advance};
use crate::error::SyncResult;

/// Inner state of [`MemoryCheckpointStore`].
#[derive(Debug, Default)]
struct Inner {
    checkpoints: BTreeMap<String, u64>,
    /// Number of times the whole set would have been written to durable storage.
    persist_count: u64,
}

/// In-memory checkpoint store.
///
/// Behaves like [`crate::checkpoint::file::FileCheckpointStore`] without touching the file
/// system, which makes it suitable for tests and dry runs. All progress is lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryCheckpointStore {
    /// Creates a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given checkpoints.
    pub fn with_checkpoints<I, K>(checkpoints: I) -> Self
    where
        I: IntoIterator<Item = (K, u64)>,
        K: Into<String>,
    {
        let inner = Inner {
            checkpoints: checkpoints
                .into_iter()
                .map(|(table_name, last_id)| (table_name.into(), last_id))
                .collect(),
            persist_count: 0,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns how many times the checkpoint set was persisted.
    pub async fn persist_count(&self) -> u64 {
        self.inner.lock().await.persist_count
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> SyncResult<usize> {
        let inner = self.inner.lock().await;

        Ok(inner.checkpoints.len())
    }

    async fn initialize(&self, tables: &[TableConfig]) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        if add_missing(&mut inner.checkpoints, tables) {
            inner.persist_count += 1;
        }

        Ok(())
    }

    async fn get_checkpoint(&self, table_name: &str) -> SyncResult<u64> {
        let inner = self.inner.lock().await;

        Ok(inner.checkpoints.get(table_name).copied().unwrap_or(0))
    }

    async fn set_and_persist(&self, table_name: &str, last_id: u64) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        advance(&mut inner.checkpoints, table_name, last_id)?;
        inner.persist_count += 1;

        Ok(())
    }

    async fn checkpoints(&self) -> SyncResult<BTreeMap<String, u64>> {
        let inner = self.inner.lock().await;

        Ok(inner.checkpoints.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::table::test_table_config;

    #[tokio::test]
    async fn initialize_keeps_existing_checkpoints() {
        let store = MemoryCheckpointStore::with_checkpoints([("history", 500)]);
        let tables = vec![
            test_table_config("history", 100),
            test_table_config("trends", 7),
        ];

        store.initialize(&tables).await.unwrap();
        store.initialize(&tables).await.unwrap();

        assert_eq!(store.get_checkpoint("history").await.unwrap(), 500);
        assert_eq!(store.get_checkpoint("trends").await.unwrap(), 7);
        assert_eq!(store.persist_count().await, 1);
    }

    #[tokio::test]
    async fn unknown_table_reads_zero() {
        let store = MemoryCheckpointStore::new();

        assert_eq!(store.get_checkpoint("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn backwards_update_is_rejected() {
        let store = MemoryCheckpointStore::with_checkpoints([("history", 149)]);

        let err = store.set_and_persist("history", 100).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(store.get_checkpoint("history").await.unwrap(), 149);
        assert_eq!(store.persist_count().await, 0);
    }
}
