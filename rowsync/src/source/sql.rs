use std::time::{Duration, Instant};

use rowsync_config::shared::{SourceConfig, SourceProvider, TableConfig};
use secrecy::{ExposeSecret, SecretString};
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Column, Connection, Row, TypeInfo};
use tracing::{debug, warn};

use crate::bail;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::source::{ExtractionResult, ExtractionWindow, Extractor, render_query};
use crate::sync_error;

/// Number of columns every ranged query must return: record, clock and row id.
const EXPECTED_COLUMNS: usize = 3;

/// Index of the record column.
const RECORD_COLUMN: usize = 0;

/// Index of the row id column.
const ID_COLUMN: usize = 2;

/// [`Extractor`] running ranged queries against Postgres or MySQL.
///
/// A connection is opened for every extraction and closed before returning, so no connection
/// is held while a poller sleeps. Connecting and querying together must finish within the
/// configured query timeout.
#[derive(Debug, Clone)]
pub struct SqlExtractor {
    provider: SourceProvider,
    address: SecretString,
    query_timeout: Duration,
}

impl SqlExtractor {
    pub fn new(provider: SourceProvider, address: SecretString, query_timeout: Duration) -> Self {
        Self {
            provider,
            address,
            query_timeout,
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(
            config.provider,
            config.address.clone(),
            config.query_timeout(),
        )
    }

    async fn extract_postgres(&self, query: &str) -> SyncResult<ExtractionResult> {
        let mut connection = PgConnection::connect(self.address.expose_secret())
            .await
            .map_err(connection_error)?;

        let rows = sqlx::query(query).fetch_all(&mut connection).await?;
        close_quietly(connection.close().await);

        scan_rows(&rows, read_postgres_id)
    }

    async fn extract_mysql(&self, query: &str) -> SyncResult<ExtractionResult> {
        let mut connection = MySqlConnection::connect(self.address.expose_secret())
            .await
            .map_err(connection_error)?;

        let rows = sqlx::query(query).fetch_all(&mut connection).await?;
        close_quietly(connection.close().await);

        scan_rows(&rows, read_mysql_id)
    }
}

impl Extractor for SqlExtractor {
    async fn extract(
        &self,
        table: &TableConfig,
        window: &ExtractionWindow,
    ) -> SyncResult<ExtractionResult> {
        let query = render_query(&table.query, window);
        let started_at = Instant::now();

        let extraction = async {
            match self.provider {
                SourceProvider::Postgres => self.extract_postgres(&query).await,
                SourceProvider::Mysql => self.extract_mysql(&query).await,
            }
        };

        let result = match tokio::time::timeout(self.query_timeout, extraction).await {
            Ok(result) => result?,
            Err(_) => {
                bail!(
                    ErrorKind::SourceTimeout,
                    "Source query timed out",
                    format!(
                        "Query for {window} did not complete within {:?}",
                        self.query_timeout
                    )
                );
            }
        };

        debug!(
            table = %window.table_name,
            provider = %self.provider,
            rows = result.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "extracted rows"
        );

        Ok(result)
    }
}

/// Converts every row into a record, tracking the highest id.
fn scan_rows<R, F>(rows: &[R], read_id: F) -> SyncResult<ExtractionResult>
where
    R: Row,
    F: Fn(&R) -> SyncResult<u64>,
    for<'r> String: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    usize: sqlx::ColumnIndex<R>,
{
    let mut result = ExtractionResult {
        records: Vec::with_capacity(rows.len()),
        max_id_seen: 0,
    };

    for row in rows {
        if row.len() != EXPECTED_COLUMNS {
            bail!(
                ErrorKind::SourceSchemaError,
                "Unexpected number of columns",
                format!(
                    "Query returned {} columns, expected record, clock and id",
                    row.len()
                )
            );
        }

        let record: String = row.try_get(RECORD_COLUMN)?;
        let id = read_id(row)?;

        result.records.push(record);
        result.max_id_seen = result.max_id_seen.max(id);
    }

    Ok(result)
}

/// Reads the id of a Postgres row as any integer width.
///
/// Postgres only decodes a column into the Rust integer of its exact width, so the declared type
/// picks the decoder.
fn read_postgres_id(row: &PgRow) -> SyncResult<u64> {
    let id = match row.column(ID_COLUMN).type_info().name() {
        "INT2" => i64::from(row.try_get::<i16, _>(ID_COLUMN)?),
        "INT4" => i64::from(row.try_get::<i32, _>(ID_COLUMN)?),
        _ => row.try_get::<i64, _>(ID_COLUMN)?,
    };

    non_negative(id)
}

/// Reads the id of a MySQL row, signed or unsigned.
///
/// Zabbix ids are `BIGINT UNSIGNED` on MySQL, which doesn't decode as `i64`.
fn read_mysql_id(row: &MySqlRow) -> SyncResult<u64> {
    if row.column(ID_COLUMN).type_info().name().ends_with("UNSIGNED") {
        return Ok(row.try_get::<u64, _>(ID_COLUMN)?);
    }

    non_negative(row.try_get::<i64, _>(ID_COLUMN)?)
}

fn non_negative(id: i64) -> SyncResult<u64> {
    u64::try_from(id).map_err(|_| {
        sync_error!(
            ErrorKind::SourceSchemaError,
            "Negative row id",
            format!("Row id {id} is negative")
        )
    })
}

fn connection_error(err: sqlx::Error) -> SyncError {
    sync_error!(
        ErrorKind::SourceConnectionFailed,
        "Failed to connect to the source database",
        err.to_string(),
        source: err
    )
}

/// Logs a failed graceful close; the socket is released either way.
fn close_quietly(result: Result<(), sqlx::Error>) {
    if let Err(err) = result {
        warn!(error = %err, "failed to close source connection");
    }
}
