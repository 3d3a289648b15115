//! Error types and result definitions for assembly operations.
//!
//! [`DataKitError`] carries an [`ErrorKind`] classification, a static description, optional
//! dynamic detail, the originating error, and the callsite location and backtrace captured when
//! it was raised. Several errors can be aggregated into one, which is how concurrent cache builds
//! report more than a single failure.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

/// Result type for fallible assembly operations.
pub type DataKitResult<T> = Result<T, DataKitError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the crate.
#[derive(Debug, Clone)]
pub struct DataKitError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    Many {
        errors: Vec<DataKitError>,
        location: &'static Location<'static>,
    },
}

/// Classification of failures.
///
/// Absent keys at lookup time are not errors and have no kind here; they are resolved by null
/// imputation.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration
    ConfigError,

    // Cache lifecycle
    CacheNotBuilt,

    // Schema & row shape
    MissingKeyColumn,
    MalformedRow,
    SourceSchemaError,

    // Data & conversion
    ConversionError,
    InvalidData,

    // Source connectivity & queries
    SourceConnectionFailed,
    SourceQueryFailed,
    SourceOperationCanceled,
    AuthenticationError,
    EncryptionError,

    // IO
    IoError,
    SourceIoError,
    DestinationIoError,

    // Workers & state
    InvalidState,
    WorkerPanic,

    SourceError,
    Unknown,
}

impl DataKitError {
    /// Returns the [`ErrorKind`] of this error, or of the first aggregated error.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error, flattened.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { .. } => "Multiple errors occurred",
        }
    }

    /// Returns the dynamic detail, or the first detail found among aggregated errors.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the aggregated errors, if this error is an aggregate.
    pub fn errors(&self) -> Option<&[DataKitError]> {
        match self.repr {
            ErrorRepr::Single(_) => None,
            ErrorRepr::Many { ref errors, .. } => Some(errors),
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches the originating error. Has no effect on aggregates.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }

        self
    }

    /// Prefixes the detail with `context`, e.g. the cache or binding that failed.
    ///
    /// Aggregates apply the context to every contained error.
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        match self.repr {
            ErrorRepr::Single(ref mut payload) => {
                let detail = match payload.detail.take() {
                    Some(detail) => format!("{context}: {detail}"),
                    None => context.to_string(),
                };
                payload.detail = Some(Cow::Owned(detail));
            }
            ErrorRepr::Many { ref mut errors, .. } => {
                let context = context.to_string();
                for error in errors.iter_mut() {
                    *error = error.clone().context(&context);
                }
            }
        }

        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        DataKitError {
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

    #[track_caller]
    fn from_source<E>(kind: ErrorKind, description: &'static str, err: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = err.to_string();
        DataKitError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl PartialEq for DataKitError {
    fn eq(&self, other: &DataKitError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => {
                a.kind == b.kind && a.description == b.description
            }
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Hash for DataKitError {
    /// Hashes the kind and static description only, so repeated occurrences of the same failure
    /// group together regardless of detail or location.
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.repr).hash(state);
        match &self.repr {
            ErrorRepr::Single(payload) => {
                payload.kind.hash(state);
                payload.description.hash(state);
            }
            ErrorRepr::Many { errors, .. } => {
                errors.len().hash(state);
                for error in errors {
                    error.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for DataKitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
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

                if let Some(detail) = payload.detail.as_deref() {
                    write_indented(f, "Detail:", detail)?;
                }

                let backtrace = payload.backtrace.to_string();
                if !backtrace.trim().is_empty() {
                    write_indented(f, "Backtrace:", &backtrace)?;
                }

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

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    write!(f, "\n  {}. {}", index + 1, lines.next().unwrap_or_default())?;
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

fn write_indented(f: &mut fmt::Formatter<'_>, header: &str, body: &str) -> fmt::Result {
    write!(f, "\n  {header}")?;
    if body.trim().is_empty() {
        return write!(f, " <empty>");
    }

    for line in body.lines() {
        if line.trim().is_empty() {
            write!(f, "\n    ")?;
        } else {
            write!(f, "\n    {line}")?;
        }
    }

    Ok(())
}

impl error::Error for DataKitError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for DataKitError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> DataKitError {
        DataKitError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for DataKitError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> DataKitError {
        DataKitError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors. A single error is returned unwrapped.
impl<E> From<Vec<E>> for DataKitError
where
    E: Into<DataKitError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> DataKitError {
        let location = Location::caller();
        let mut errors: Vec<DataKitError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        DataKitError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for DataKitError {
    #[track_caller]
    fn from(err: std::io::Error) -> DataKitError {
        DataKitError::from_source(ErrorKind::IoError, "I/O operation failed", err)
    }
}

/// Maps [`csv::Error`]: unreadable files to [`ErrorKind::SourceIoError`], records that do not
/// decode to [`ErrorKind::MalformedRow`].
impl From<csv::Error> for DataKitError {
    #[track_caller]
    fn from(err: csv::Error) -> DataKitError {
        let (kind, description) = match err.kind() {
            csv::ErrorKind::Io(_) => (ErrorKind::SourceIoError, "Delimited file read failed"),
            csv::ErrorKind::Utf8 { .. } | csv::ErrorKind::UnequalLengths { .. } => {
                (ErrorKind::MalformedRow, "Delimited file record is malformed")
            }
            csv::ErrorKind::Serialize(_) => {
                (ErrorKind::DestinationIoError, "Delimited file write failed")
            }
            _ => (ErrorKind::SourceError, "Delimited file operation failed"),
        };

        DataKitError::from_source(kind, description, err)
    }
}

/// Maps [`tokio_postgres::Error`] by SQLSTATE class.
impl From<tokio_postgres::Error> for DataKitError {
    #[track_caller]
    fn from(err: tokio_postgres::Error) -> DataKitError {
        let (kind, description) = match err.code().map(|state| state.code()) {
            Some(code) => match &code[..2] {
                "08" | "53" => (
                    ErrorKind::SourceConnectionFailed,
                    "PostgreSQL connection failed",
                ),
                "28" => (
                    ErrorKind::AuthenticationError,
                    "PostgreSQL authentication failed",
                ),
                "22" => (
                    ErrorKind::ConversionError,
                    "PostgreSQL data conversion failed",
                ),
                "42" if matches!(code, "42P01" | "42703" | "42883") => (
                    ErrorKind::SourceSchemaError,
                    "PostgreSQL schema object not found",
                ),
                "42" | "54" | "XX" | "P0" => {
                    (ErrorKind::SourceQueryFailed, "PostgreSQL query failed")
                }
                "57" => (
                    ErrorKind::SourceOperationCanceled,
                    "PostgreSQL operation canceled",
                ),
                "58" => (ErrorKind::SourceIoError, "PostgreSQL I/O error"),
                "24" | "25" | "40" | "55" => {
                    (ErrorKind::InvalidState, "PostgreSQL transaction failed")
                }
                _ => (ErrorKind::SourceError, "PostgreSQL error"),
            },
            // Errors without a SQLSTATE come from the client side of the connection.
            None if err.is_closed() => (
                ErrorKind::SourceConnectionFailed,
                "PostgreSQL connection closed",
            ),
            None => (
                ErrorKind::SourceConnectionFailed,
                "PostgreSQL connection failed",
            ),
        };

        DataKitError::from_source(kind, description, err)
    }
}

impl From<sqlx::Error> for DataKitError {
    #[track_caller]
    fn from(err: sqlx::Error) -> DataKitError {
        let kind = match &err {
            sqlx::Error::Io(_) => ErrorKind::SourceIoError,
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
                ErrorKind::SourceConnectionFailed
            }
            _ => ErrorKind::SourceQueryFailed,
        };

        DataKitError::from_source(kind, "Database operation failed", err)
    }
}

impl From<rustls::Error> for DataKitError {
    #[track_caller]
    fn from(err: rustls::Error) -> DataKitError {
        DataKitError::from_source(ErrorKind::EncryptionError, "TLS configuration failed", err)
    }
}

impl From<config::shared::ValidationError> for DataKitError {
    #[track_caller]
    fn from(err: config::shared::ValidationError) -> DataKitError {
        DataKitError::from_source(ErrorKind::ConfigError, "Invalid configuration", err)
    }
}

/// Maps a failed worker task to [`ErrorKind::WorkerPanic`], or to
/// [`ErrorKind::SourceOperationCanceled`] when the task was cancelled.
impl From<tokio::task::JoinError> for DataKitError {
    #[track_caller]
    fn from(err: tokio::task::JoinError) -> DataKitError {
        if err.is_cancelled() {
            DataKitError::from_source(
                ErrorKind::SourceOperationCanceled,
                "Worker task was cancelled",
                err,
            )
        } else {
            DataKitError::from_source(ErrorKind::WorkerPanic, "Worker task panicked", err)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;

    use super::*;
    use crate::datakit_error;

    fn hash_of(err: &DataKitError) -> u64 {
        let mut hasher = DefaultHasher::new();
        err.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn display_includes_kind_description_and_detail() {
        let err = datakit_error!(
            ErrorKind::MissingKeyColumn,
            "Key column missing from event",
            "column `user_id`"
        );

        let rendered = err.to_string();
        assert!(rendered.starts_with("[MissingKeyColumn] Key column missing from event @ "));
        assert!(rendered.contains("Detail:\n    column `user_id`"));
    }

    #[test]
    fn equality_and_hash_ignore_detail() {
        let a = datakit_error!(ErrorKind::CacheNotBuilt, "Cache not built", "cache a");
        let b = datakit_error!(ErrorKind::CacheNotBuilt, "Cache not built", "cache b");

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn single_error_vector_is_unwrapped() {
        let err = DataKitError::from(vec![datakit_error!(
            ErrorKind::ConfigError,
            "Invalid configuration"
        )]);

        assert!(err.errors().is_none());
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn aggregate_reports_all_kinds() {
        let err = DataKitError::from(vec![
            datakit_error!(ErrorKind::SourceIoError, "File not found"),
            datakit_error!(ErrorKind::MalformedRow, "Bad record"),
        ]);

        assert_eq!(err.kind(), ErrorKind::SourceIoError);
        assert_eq!(
            err.kinds(),
            vec![ErrorKind::SourceIoError, ErrorKind::MalformedRow]
        );
        assert!(err.to_string().starts_with("[Many] 2 errors aggregated"));
    }

    #[test]
    fn context_prefixes_detail() {
        let err = datakit_error!(ErrorKind::MalformedRow, "Schema drift", "row 3")
            .context("cache `users`");

        assert_eq!(err.detail(), Some("cache `users`: row 3"));

        let err = datakit_error!(ErrorKind::MalformedRow, "Schema drift").context("binding #1");
        assert_eq!(err.detail(), Some("binding #1"));
    }

    #[test]
    fn io_errors_keep_their_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        let err = DataKitError::from(io);

        assert_eq!(err.kind(), ErrorKind::IoError);
        assert!(error::Error::source(&err).is_some());
    }
}
