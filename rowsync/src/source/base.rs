use std::fmt;
use std::future::Future;

use rowsync_config::shared::{END_ID_PLACEHOLDER, START_ID_PLACEHOLDER, TableConfig};

use crate::error::SyncResult;

/// Id range requested from the source in one poll cycle.
///
/// `start_id` is inclusive and `end_id` is exclusive. The window bounds the ids a query may
/// return, not the number of returned rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionWindow {
    pub table_name: String,
    pub start_id: u64,
    pub end_id: u64,
}

impl ExtractionWindow {
    /// Creates the window `[start_id, start_id + size)`, saturating at [`u64::MAX`].
    pub fn new(table_name: impl Into<String>, start_id: u64, size: u64) -> Self {
        Self {
            table_name: table_name.into(),
            start_id,
            end_id: start_id.saturating_add(size),
        }
    }

    /// Returns `true` if `id` falls inside the window.
    pub fn contains(&self, id: u64) -> bool {
        id >= self.start_id && id < self.end_id
    }
}

impl fmt::Display for ExtractionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}, {})", self.table_name, self.start_id, self.end_id)
    }
}

/// Records returned by one extraction, in query order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Sink-ready records, already formatted by the query.
    pub records: Vec<String>,
    /// Highest row id among the returned rows, 0 if there were none.
    pub max_id_seen: u64,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Trait for sources that can run a table's ranged query.
///
/// Implementations are shared by all pollers, so they must tolerate concurrent extractions for
/// different tables. An error never carries partial results.
pub trait Extractor {
    /// Runs the query of `table` over `window` and returns the records in query order.
    fn extract(
        &self,
        table: &TableConfig,
        window: &ExtractionWindow,
    ) -> impl Future<Output = SyncResult<ExtractionResult>> + Send;
}

/// Substitutes the window bounds into a query template.
pub fn render_query(template: &str, window: &ExtractionWindow) -> String {
    template
        .replace(START_ID_PLACEHOLDER, &window.start_id.to_string())
        .replace(END_ID_PLACEHOLDER, &window.end_id.to_string())
}
