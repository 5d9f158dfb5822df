//! Error types and result definitions for rowsync operations.
//!
//! Provides an error system with classification, aggregation, and captured diagnostic metadata.
//! The [`SyncError`] type supports single errors, errors with additional detail, and multiple
//! aggregated errors, which is how the orchestrator reports several failed pollers at once.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for rowsync operations using [`SyncError`] as the error type.
pub type SyncResult<T> = Result<T, SyncError>;

/// Detailed payload stored for single [`SyncError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for rowsync operations.
///
/// [`SyncError`] can represent a single classified error or multiple aggregated errors. Every
/// single error records the callsite that created it and a backtrace (captured according to
/// `RUST_BACKTRACE`).
#[derive(Debug, Clone)]
pub struct SyncError {
    repr: ErrorRepr,
}

/// Internal representation of error data.
#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Single error payload holding rich metadata.
    Single(ErrorPayload),
    /// Multiple aggregated errors, mainly used to report several poller failures.
    Many {
        errors: Vec<SyncError>,
        location: &'static Location<'static>,
    },
}

/// Specific categories of errors that can occur while syncing tables.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration Errors
    ConfigError,

    // Source Errors
    SourceConnectionFailed,
    SourceQueryFailed,
    SourceSchemaError,
    SourceTimeout,

    // Destination Errors
    DestinationConnectionFailed,
    DestinationWriteRejected,
    DestinationTimeout,
    DestinationError,

    // Checkpoint Errors
    CheckpointPersistenceFailed,
    CheckpointCorrupted,

    // IO & Serialization Errors
    IoError,
    SerializationError,
    DeserializationError,

    // State & Workflow Errors
    InvalidState,
    PollerPanic,

    // Unknown / Uncategorized
    Unknown,
}

/// Coarse classification of [`ErrorKind`]s, matching how a failure affects the system.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
pub enum ErrorCategory {
    /// Invalid configuration, fatal at startup.
    Configuration,
    /// The ranged query against the source failed.
    Extraction,
    /// The sink rejected a batch or was unreachable.
    Delivery,
    /// The checkpoint file couldn't be read or written.
    Persistence,
    /// Bugs and unexpected runtime failures.
    Internal,
}

impl ErrorKind {
    /// Returns the [`ErrorCategory`] this kind belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::ConfigError => ErrorCategory::Configuration,
            ErrorKind::SourceConnectionFailed
            | ErrorKind::SourceQueryFailed
            | ErrorKind::SourceSchemaError
            | ErrorKind::SourceTimeout => ErrorCategory::Extraction,
            ErrorKind::DestinationConnectionFailed
            | ErrorKind::DestinationWriteRejected
            | ErrorKind::DestinationTimeout
            | ErrorKind::DestinationError => ErrorCategory::Delivery,
            ErrorKind::CheckpointPersistenceFailed
            | ErrorKind::CheckpointCorrupted
            | ErrorKind::IoError
            | ErrorKind::SerializationError
            | ErrorKind::DeserializationError => ErrorCategory::Persistence,
            ErrorKind::InvalidState | ErrorKind::PollerPanic | ErrorKind::Unknown => {
                ErrorCategory::Internal
            }
        }
    }
}

impl SyncError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
        }
    }

    /// Returns the [`ErrorCategory`] of [`SyncError::kind`].
    pub fn category(&self) -> ErrorCategory {
        self.kind().category()
    }

    /// Returns the detailed error information if available.
    ///
    /// For multiple errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the aggregated errors, or `None` for a single error.
    pub fn errors(&self) -> Option<&[SyncError]> {
        match self.repr {
            ErrorRepr::Single(_) => None,
            ErrorRepr::Many { ref errors, .. } => Some(errors),
        }
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// Has no effect when called on aggregated errors because aggregates forward the first
    /// contained error as their source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }

        self
    }

    /// Creates a [`SyncError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SyncError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for SyncError {
    fn eq(&self, other: &SyncError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (
                ErrorRepr::Many {
                    errors: errors_a, ..
                },
                ErrorRepr::Many {
                    errors: errors_b, ..
                },
            ) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                write_detail(payload.detail.as_deref(), f, 1)?;
                write_backtrace(payload.backtrace.as_ref(), f, 1)?;

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if errors.is_empty() {
                    write!(f, "\n  (no inner errors provided)")?;
                }

                for (index, error) in errors.iter().enumerate() {
                    let rendered = format!("{error}");
                    let mut lines = rendered.lines();
                    match lines.next() {
                        Some(first_line) => write!(f, "\n  {}. {}", index + 1, first_line)?,
                        None => write!(f, "\n  {}.", index + 1)?,
                    }

                    for line in lines {
                        if line.is_empty() {
                            write!(f, "\n     ")?;
                        } else {
                            write!(f, "\n     {line}")?;
                        }
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for SyncError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            // For aggregated errors, we forward the first contained error as the source.
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Writes the captured backtrace with indentation.
fn write_backtrace(
    backtrace: &Backtrace,
    f: &mut fmt::Formatter<'_>,
    indent: usize,
) -> fmt::Result {
    let indent_str = "  ".repeat(indent);

    let rendered_backtrace = format!("{backtrace}");
    if !rendered_backtrace.trim().is_empty() {
        write!(f, "\n{indent_str}Backtrace:")?;
        for line in rendered_backtrace.lines() {
            if line.trim().is_empty() {
                write!(f, "\n{indent_str}  ")?;
            } else {
                write!(f, "\n{indent_str}  {line}")?;
            }
        }
    }

    Ok(())
}

/// Writes the detail block with indentation.
fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    if let Some(detail) = detail {
        let indent_str = "  ".repeat(indent);
        if detail.trim().is_empty() {
            write!(f, "\n{indent_str}Detail: <empty>")?;
        } else {
            write!(f, "\n{indent_str}Detail:")?;
            for line in detail.lines() {
                if line.trim().is_empty() {
                    write!(f, "\n{indent_str}  ")?;
                } else {
                    write!(f, "\n{indent_str}  {line}")?;
                }
            }
        }
    }

    Ok(())
}

/// Creates a [`SyncError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for SyncError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`SyncError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for SyncError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SyncError {
        SyncError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Creates a [`SyncError`] from a vector of errors for aggregation.
///
/// If the vector contains exactly one error, returns that error directly without wrapping
/// it in the [`ErrorRepr::Many`] variant.
impl<E> From<Vec<E>> for SyncError
where
    E: Into<SyncError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> SyncError {
        let location = Location::caller();

        let mut errors: Vec<SyncError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        SyncError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Converts [`std::io::Error`] to [`SyncError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for SyncError {
    #[track_caller]
    fn from(err: std::io::Error) -> SyncError {
        let detail = err.to_string();
        SyncError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`serde_json::Error`] to [`SyncError`] with the appropriate error kind.
impl From<serde_json::Error> for SyncError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SyncError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`sqlx::Error`] to [`SyncError`] with the appropriate source error kind.
///
/// Maps database errors to [`ErrorKind::SourceQueryFailed`], transport and pool errors to
/// [`ErrorKind::SourceConnectionFailed`], and decoding errors to [`ErrorKind::SourceSchemaError`].
impl From<sqlx::Error> for SyncError {
    #[track_caller]
    fn from(err: sqlx::Error) -> SyncError {
        let kind = match &err {
            sqlx::Error::Database(_) => ErrorKind::SourceQueryFailed,
            sqlx::Error::Configuration(_)
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut => ErrorKind::SourceConnectionFailed,
            sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => ErrorKind::SourceSchemaError,
            _ => ErrorKind::SourceQueryFailed,
        };

        let detail = err.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed("Source database operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`reqwest::Error`] to [`SyncError`] with the appropriate destination error kind.
impl From<reqwest::Error> for SyncError {
    #[track_caller]
    fn from(err: reqwest::Error) -> SyncError {
        let kind = if err.is_timeout() {
            ErrorKind::DestinationTimeout
        } else if err.is_connect() {
            ErrorKind::DestinationConnectionFailed
        } else if err.is_status() {
            ErrorKind::DestinationWriteRejected
        } else {
            ErrorKind::DestinationError
        };

        let detail = err.to_string();
        SyncError::from_components(
            kind,
            Cow::Borrowed("Destination request failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync_error;

    #[test]
    fn single_error_exposes_kind_detail_and_category() {
        let err = sync_error!(
            ErrorKind::DestinationWriteRejected,
            "Write rejected",
            "status 400"
        );

        assert_eq!(err.kind(), ErrorKind::DestinationWriteRejected);
        assert_eq!(err.category(), ErrorCategory::Delivery);
        assert_eq!(err.detail(), Some("status 400"));
        assert!(err.errors().is_none());
        assert!(err.to_string().contains("Write rejected"));
    }

    #[test]
    fn aggregation_of_one_error_is_not_wrapped() {
        let err: SyncError = vec![sync_error!(ErrorKind::SourceTimeout, "Timed out")].into();

        assert!(err.errors().is_none());
        assert_eq!(err.kind(), ErrorKind::SourceTimeout);
    }

    #[test]
    fn aggregation_keeps_all_kinds_in_order() {
        let err: SyncError = vec![
            sync_error!(ErrorKind::SourceQueryFailed, "Query failed"),
            sync_error!(ErrorKind::CheckpointPersistenceFailed, "Write failed"),
        ]
        .into();

        assert_eq!(
            err.kinds(),
            vec![
                ErrorKind::SourceQueryFailed,
                ErrorKind::CheckpointPersistenceFailed
            ]
        );
        assert_eq!(err.errors().map(<[SyncError]>::len), Some(2));
        assert!(err.to_string().starts_with("[Many] 2 errors aggregated"));
    }

    #[test]
    fn io_errors_keep_their_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = SyncError::from(io);

        assert_eq!(err.kind(), ErrorKind::IoError);
        assert!(error::Error::source(&err).is_some());
    }
}
