use rowsync_config::shared::TableConfig;

/// Returns an active table config polling `name` every second, 50 ids per window and 20 records
/// per batch.
pub fn test_table_config(name: &str, start_id: u64) -> TableConfig {
    TableConfig {
        name: name.to_owned(),
        active: true,
        start_id,
        interval_secs: 1,
        input_rows_per_window: 50,
        output_rows_per_batch: 20,
        query: format!(
            "SELECT line, clock, id FROM {name} WHERE id >= ##STARTID## AND id < ##ENDID## ORDER BY id"
        ),
    }
}

/// Formats the record a [`crate::test_utils::memory_extractor::MemoryExtractor`] row is
/// expected to carry.
pub fn test_record(table_name: &str, id: u64) -> String {
    format!("{table_name},itemid={id} value={id} {id}")
}
