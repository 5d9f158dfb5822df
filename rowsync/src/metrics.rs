//! Metrics definitions for table poller monitoring.

/// Label for table name in metrics.
pub const TABLE_NAME_LABEL: &str = "table_name";

/// Label for error kind in metrics.
pub const ERROR_KIND_LABEL: &str = "error_kind";

/// Label for destination name in metrics.
pub const DESTINATION_LABEL: &str = "destination";

/// Counter for rows returned by ranged queries.
pub const ROWSYNC_ROWS_EXTRACTED_TOTAL: &str = "rowsync_rows_extracted_total";

/// Counter for rows accepted by the destination.
pub const ROWSYNC_ROWS_DELIVERED_TOTAL: &str = "rowsync_rows_delivered_total";

/// Counter for batches accepted by the destination.
pub const ROWSYNC_BATCHES_DELIVERED_TOTAL: &str = "rowsync_batches_delivered_total";

/// Counter for completed poll cycles, including empty ones.
pub const ROWSYNC_POLL_CYCLES_TOTAL: &str = "rowsync_poll_cycles_total";

/// Histogram for the duration of a completed poll cycle, sleep excluded.
pub const ROWSYNC_POLL_CYCLE_DURATION_SECONDS: &str = "rowsync_poll_cycle_duration_seconds";

/// Counter for pollers that stopped with an error.
pub const ROWSYNC_POLLER_ERRORS_TOTAL: &str = "rowsync_poller_errors_total";

/// Gauge for the last persisted checkpoint of each table.
pub const ROWSYNC_CHECKPOINT: &str = "rowsync_checkpoint";
