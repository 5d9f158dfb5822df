#![cfg(feature = "test-utils")]

//! Ranged queries against live databases.
//!
//! Tests run against the databases named by `TESTS_POSTGRES_URL` and `TESTS_MYSQL_URL` and are
//! skipped when the variable is unset. Queries only use literal rows, no tables are created.

use rowsync::error::{ErrorCategory, ErrorKind};
use rowsync::source::{ExtractionResult, ExtractionWindow, Extractor};
use rowsync::test_utils::database::{
    mysql_test_extractor, postgres_test_extractor, query_table_config,
};
use rowsync_telemetry::tracing::init_test_tracing;

/// Rows `(line, clock, id)` shared by every query, returned in clock order by the queries.
///
/// With a window starting at 10, `z` falls outside of it.
const ROWS: [(&str, u32, u32); 4] = [("b", 2, 12), ("a", 1, 10), ("c", 3, 11), ("z", 4, 60)];

fn postgres_values() -> String {
    ROWS.iter()
        .map(|(line, clock, id)| format!("('{line}', {clock}, {id})"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn mysql_values() -> String {
    ROWS.iter()
        .map(|(line, clock, id)| format!("SELECT '{line}' AS line, {clock} AS clock, {id} AS id"))
        .collect::<Vec<_>>()
        .join(" UNION ALL ")
}

/// Query returning the id column as `id_expression`, ordered by clock.
fn postgres_query(id_expression: &str) -> String {
    format!(
        "SELECT line, clock, {id_expression} FROM (VALUES {}) AS t(line, clock, id) \
         WHERE id >= ##STARTID## AND id < ##ENDID## ORDER BY clock",
        postgres_values()
    )
}

fn mysql_query(id_expression: &str) -> String {
    format!(
        "SELECT line, clock, {id_expression} FROM ({}) AS t \
         WHERE id >= ##STARTID## AND id < ##ENDID## ORDER BY clock",
        mysql_values()
    )
}

fn expected_window_rows() -> ExtractionResult {
    ExtractionResult {
        records: vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
        max_id_seen: 12,
    }
}

#[tokio::test]
async fn postgres_ids_of_every_integer_width_are_read() {
    init_test_tracing();
    let Some(extractor) = postgres_test_extractor() else {
        return;
    };

    for id_type in ["int2", "int4", "int8"] {
        let table = query_table_config("history", 10, postgres_query(&format!("id::{id_type}")));
        let window = ExtractionWindow::new("history", 10, 50);

        let result = extractor.extract(&table, &window).await.unwrap();

        // Query order is kept even though ids are not ascending.
        assert_eq!(result, expected_window_rows(), "id column of type {id_type}");
    }
}

#[tokio::test]
async fn postgres_empty_window_has_no_max_id() {
    init_test_tracing();
    let Some(extractor) = postgres_test_extractor() else {
        return;
    };

    let table = query_table_config("history", 100, postgres_query("id::int8"));
    let window = ExtractionWindow::new("history", 100, 50);

    let result = extractor.extract(&table, &window).await.unwrap();

    assert_eq!(result, ExtractionResult::default());
}

#[tokio::test]
async fn postgres_wrong_column_count_is_a_schema_error() {
    init_test_tracing();
    let Some(extractor) = postgres_test_extractor() else {
        return;
    };

    let query = format!(
        "SELECT line, id FROM (VALUES {}) AS t(line, clock, id) \
         WHERE id >= ##STARTID## AND id < ##ENDID##",
        postgres_values()
    );
    let table = query_table_config("history", 10, query);
    let window = ExtractionWindow::new("history", 10, 50);

    let err = extractor.extract(&table, &window).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceSchemaError);
    assert_eq!(err.category(), ErrorCategory::Extraction);
}

#[tokio::test]
async fn postgres_negative_id_is_a_schema_error() {
    init_test_tracing();
    let Some(extractor) = postgres_test_extractor() else {
        return;
    };

    let table = query_table_config(
        "history",
        0,
        "SELECT 'a'::text, 1, -5::int4 WHERE ##STARTID## >= 0 AND ##ENDID## > 0",
    );
    let window = ExtractionWindow::new("history", 0, 50);

    let err = extractor.extract(&table, &window).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceSchemaError);
}

#[tokio::test]
async fn postgres_invalid_query_is_a_query_error() {
    init_test_tracing();
    let Some(extractor) = postgres_test_extractor() else {
        return;
    };

    let table = query_table_config(
        "history",
        0,
        "SELECT line, clock, id FROM missing_table WHERE id >= ##STARTID## AND id < ##ENDID##",
    );
    let window = ExtractionWindow::new("history", 0, 50);

    let err = extractor.extract(&table, &window).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceQueryFailed);
}

#[tokio::test]
async fn mysql_signed_and_unsigned_ids_are_read() {
    init_test_tracing();
    let Some(extractor) = mysql_test_extractor() else {
        return;
    };

    for id_expression in ["CAST(id AS UNSIGNED)", "CAST(id AS SIGNED)", "id"] {
        let table = query_table_config("history", 10, mysql_query(id_expression));
        let window = ExtractionWindow::new("history", 10, 50);

        let result = extractor.extract(&table, &window).await.unwrap();

        assert_eq!(result, expected_window_rows(), "id column `{id_expression}`");
    }
}

#[tokio::test]
async fn mysql_wrong_column_count_is_a_schema_error() {
    init_test_tracing();
    let Some(extractor) = mysql_test_extractor() else {
        return;
    };

    let query = format!(
        "SELECT line, clock, id, id AS extra FROM ({}) AS t \
         WHERE id >= ##STARTID## AND id < ##ENDID##",
        mysql_values()
    );
    let table = query_table_config("history", 10, query);
    let window = ExtractionWindow::new("history", 10, 50);

    let err = extractor.extract(&table, &window).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceSchemaError);
}
