use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use rowsync_config::shared::TableConfig;
use tokio::sync::Mutex;

use crate::error::{ErrorKind, SyncResult};
use crate::source::{ExtractionResult, ExtractionWindow, Extractor};
use crate::sync_error;
use crate::test_utils::table::test_record;

#[derive(Debug, Default)]
struct Inner {
    /// Rows per table as `(id, record)`, in the order queries return them.
    rows: HashMap<String, Vec<(u64, String)>>,
    /// Every window requested so far.
    windows: Vec<ExtractionWindow>,
    /// Errors returned by the next extractions of a table, one per call.
    failures: HashMap<String, VecDeque<ErrorKind>>,
}

/// [`Extractor`] serving rows from memory.
///
/// Extraction returns the stored rows of the table whose id falls into the requested window, in
/// insertion order, which mimics a ranged query with `ORDER BY id` when rows are added sorted.
#[derive(Debug, Clone, Default)]
pub struct MemoryExtractor {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds rows with the given ids, generating their records with [`test_record`].
    pub async fn add_ids(&self, table_name: &str, ids: impl IntoIterator<Item = u64>) {
        let rows = ids.into_iter().map(|id| (id, test_record(table_name, id)));
        self.add_rows(table_name, rows).await;
    }

    pub async fn add_rows(&self, table_name: &str, rows: impl IntoIterator<Item = (u64, String)>) {
        let mut inner = self.inner.lock().await;
        inner
            .rows
            .entry(table_name.to_owned())
            .or_default()
            .extend(rows);
    }

    /// Makes the next extraction of `table_name` fail with `kind`.
    pub async fn fail_next(&self, table_name: &str, kind: ErrorKind) {
        let mut inner = self.inner.lock().await;
        inner
            .failures
            .entry(table_name.to_owned())
            .or_default()
            .push_back(kind);
    }

    /// Returns the windows requested for `table_name`, in request order.
    pub async fn windows(&self, table_name: &str) -> Vec<ExtractionWindow> {
        let inner = self.inner.lock().await;
        inner
            .windows
            .iter()
            .filter(|window| window.table_name == table_name)
            .cloned()
            .collect()
    }
}

impl Extractor for MemoryExtractor {
    async fn extract(
        &self,
        table: &TableConfig,
        window: &ExtractionWindow,
    ) -> SyncResult<ExtractionResult> {
        let mut inner = self.inner.lock().await;
        inner.windows.push(window.clone());

        if let Some(kind) = inner
            .failures
            .get_mut(&table.name)
            .and_then(VecDeque::pop_front)
        {
            return Err(sync_error!(
                kind,
                "Injected extraction failure",
                format!("Extraction of {window} failed on purpose")
            ));
        }

        let mut result = ExtractionResult::default();
        for (id, record) in inner.rows.get(&table.name).into_iter().flatten() {
            if window.contains(*id) {
                result.records.push(record.clone());
                result.max_id_seen = result.max_id_seen.max(*id);
            }
        }

        Ok(result)
    }
}
