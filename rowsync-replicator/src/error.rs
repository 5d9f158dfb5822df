use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

use rowsync::error::SyncError;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

/// Result type for replicator operations.
pub type ReplicatorResult<T> = Result<T, ReplicatorError>;

/// Captured backtrace wrapper to avoid thiserror's unstable feature detection.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for the replicator binary.
///
/// Wraps [`SyncError`] for polling errors and adds the failures that can happen while the
/// process is being set up.
#[derive(Debug)]
pub enum ReplicatorError {
    /// Polling error, possibly aggregating several failed tables.
    Sync(SyncError),
    /// Configuration, logging or metrics setup error.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// I/O error.
    Io(std::io::Error, CapturedBacktrace),
}

impl ReplicatorError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            ReplicatorError::Sync(_) => "replicator error",
            ReplicatorError::Config(_, _) => "configuration error",
            ReplicatorError::Io(_, _) => "i/o error",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            ReplicatorError::Sync(err) => err.backtrace(),
            ReplicatorError::Config(_, cb) => Some(&cb.0),
            ReplicatorError::Io(_, cb) => Some(&cb.0),
        }
    }

    /// Creates a configuration error from any error source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        ReplicatorError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("replicator failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        // Aggregated errors already render each inner error.
        if !matches!(self, ReplicatorError::Sync(err) if err.errors().is_some()) {
            let mut source = Error::source(self);
            let mut idx = 1usize;
            while let Some(err) = source {
                out.push_str(&format!("cause {idx}: {err}\n"));
                source = err.source();
                idx += 1;
            }
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for ReplicatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicatorError::Sync(err) => write!(f, "{err}"),
            ReplicatorError::Config(source, _) => write!(f, "configuration error: {source}"),
            ReplicatorError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for ReplicatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReplicatorError::Sync(err) => err.source(),
            ReplicatorError::Config(source, _) => Some(source.as_ref()),
            ReplicatorError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for ReplicatorError {
    fn from(err: std::io::Error) -> Self {
        ReplicatorError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<SyncError> for ReplicatorError {
    fn from(err: SyncError) -> Self {
        ReplicatorError::Sync(err)
    }
}

#[cfg(test)]
mod tests {
    use rowsync::error::ErrorKind;
    use rowsync::sync_error;

    use super::*;

    #[test]
    fn report_lists_category_and_causes() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "checkpoints.json");
        let err = ReplicatorError::Sync(sync_error!(
            ErrorKind::CheckpointPersistenceFailed,
            "Failed to read checkpoint file",
            source: io
        ));

        let report = err.render_report();

        assert!(report.starts_with("replicator failed\ncategory: replicator error\n"));
        assert!(report.contains("cause 1: checkpoints.json"));
    }

    #[test]
    fn aggregated_report_has_no_cause_chain() {
        let err = ReplicatorError::Sync(
            vec![
                sync_error!(ErrorKind::SourceTimeout, "Timed out"),
                sync_error!(ErrorKind::DestinationTimeout, "Timed out"),
            ]
            .into(),
        );

        assert!(!err.render_report().contains("cause 1"));
    }
}
