use std::path::Path;
use std::sync::Once;

use rowsync_config::shared::LogConfig;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::log::SetLoggerError;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable that turns on log output in tests.
const ENABLE_TEST_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
    #[error("failed to install the log bridge: {0}")]
    LogBridge(#[from] SetLoggerError),
    #[error("failed to install the tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Keeps the background file writer alive; logs buffered for files are flushed on drop.
#[must_use = "dropping the flusher stops file logging"]
pub struct LogFlusher {
    _guard: Option<WorkerGuard>,
}

/// Installs the global tracing subscriber.
///
/// Logs go to stdout and, when [`LogConfig::directory`] is set, to daily rolling files named
/// after `app_name`. `RUST_LOG` takes precedence over [`LogConfig::level`]. Records emitted via
/// the `log` crate by dependencies are forwarded to tracing.
pub fn init_tracing(app_name: &str, config: &LogConfig) -> Result<LogFlusher, TracingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    let (file_layer, guard) = match config.directory.as_deref() {
        Some(directory) => {
            let (writer, guard) = file_writer(directory, app_name);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);

            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_log::LogTracer::init()?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()?;

    Ok(LogFlusher { _guard: guard })
}

fn file_writer(
    directory: &Path,
    app_name: &str,
) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
    let appender = tracing_appender::rolling::daily(directory, format!("{app_name}.log"));
    tracing_appender::non_blocking(appender)
}

/// Installs a test subscriber once per process when `ENABLE_TRACING` is set.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();

    if std::env::var(ENABLE_TEST_TRACING_ENV_NAME).is_err() {
        return;
    }

    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("rowsync=debug"));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}
