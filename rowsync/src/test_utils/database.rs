use std::time::Duration;

use rowsync_config::shared::{SourceProvider, TableConfig};
use secrecy::SecretString;

use crate::source::sql::SqlExtractor;
use crate::test_utils::table::test_table_config;

/// Environment variable holding the url of the Postgres database used by source tests.
pub const POSTGRES_URL_ENV: &str = "TESTS_POSTGRES_URL";

/// Environment variable holding the url of the MySQL database used by source tests.
pub const MYSQL_URL_ENV: &str = "TESTS_MYSQL_URL";

fn database_url(variable: &str) -> Option<SecretString> {
    match std::env::var(variable) {
        Ok(url) if !url.is_empty() => Some(SecretString::new(url)),
        _ => {
            eprintln!("{variable} is not set, skipping test against a live database");
            None
        }
    }
}

/// Returns an extractor for the database named by `TESTS_POSTGRES_URL`, if set.
///
/// Source tests only run literal queries, so any database the user can connect to works.
pub fn postgres_test_extractor() -> Option<SqlExtractor> {
    database_url(POSTGRES_URL_ENV)
        .map(|url| SqlExtractor::new(SourceProvider::Postgres, url, Duration::from_secs(30)))
}

/// Returns an extractor for the database named by `TESTS_MYSQL_URL`, if set.
pub fn mysql_test_extractor() -> Option<SqlExtractor> {
    database_url(MYSQL_URL_ENV)
        .map(|url| SqlExtractor::new(SourceProvider::Mysql, url, Duration::from_secs(30)))
}

/// Returns a table config running `query` with a window of 50 ids starting at `start_id`.
pub fn query_table_config(name: &str, start_id: u64, query: impl Into<String>) -> TableConfig {
    TableConfig {
        query: query.into(),
        ..test_table_config(name, start_id)
    }
}
