//! Error types and result definitions for CDR ingestion.
//!
//! [`CdrError`] classifies failures with an [`ErrorKind`], keeps a static description and
//! optional dynamic detail, and captures where the error was created. Several errors, for
//! example one per failed worker, can be aggregated into a single value.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type used across the ingestion pipeline.
pub type CdrResult<T> = Result<T, CdrError>;

/// Payload of a single [`CdrError`].
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct CdrError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Errors collected from several workers of the same tick.
    Many {
        errors: Vec<CdrError>,
        location: &'static Location<'static>,
    },
}

/// Categories of failures in the pipeline.
///
/// Kinds are grouped by the collaborator that failed so callers can decide whether an
/// operation is worth retrying.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Queue Errors
    QueueConnectionFailed,
    QueueOperationFailed,

    // Destination Errors
    DestinationConnectionFailed,
    DestinationQueryFailed,
    FileOperationFailed,

    // Data Errors
    ConversionError,
    DeserializationError,

    // Configuration & Security Errors
    ConfigError,
    AuthenticationError,

    // Runtime Errors
    IoError,
    WorkerPanic,

    Unknown,
}

impl CdrError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For aggregated errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// when the aggregate is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => errors.iter().flat_map(|err| err.kinds()).collect(),
        }
    }

    /// Returns the static description, or `None` for aggregated errors.
    pub fn description(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.description.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the dynamic detail if any.
    ///
    /// For aggregated errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
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

    /// Attaches an originating error, exposed through [`error::Error::source`].
    ///
    /// Has no effect on aggregated errors, which forward their first error as source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
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
        CdrError {
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
        CdrError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl PartialEq for CdrError {
    fn eq(&self, other: &CdrError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for CdrError {
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
    if body.trim().is_empty() {
        return write!(f, "\n  {header} <empty>");
    }

    write!(f, "\n  {header}")?;
    for line in body.lines() {
        if line.trim().is_empty() {
            write!(f, "\n    ")?;
        } else {
            write!(f, "\n    {line}")?;
        }
    }

    Ok(())
}

impl error::Error for CdrError {
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

impl From<(ErrorKind, &'static str)> for CdrError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> CdrError {
        CdrError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for CdrError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> CdrError {
        CdrError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors. A single error is returned as is instead of being wrapped.
impl<E> From<Vec<E>> for CdrError
where
    E: Into<CdrError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> CdrError {
        let location = Location::caller();
        let mut errors: Vec<CdrError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        CdrError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for CdrError {
    #[track_caller]
    fn from(err: std::io::Error) -> CdrError {
        CdrError::from_source(ErrorKind::IoError, "I/O operation failed", err)
    }
}

/// Maps JSON failures to [`ErrorKind::DeserializationError`] unless the failure came
/// from the underlying reader or writer.
impl From<serde_json::Error> for CdrError {
    #[track_caller]
    fn from(err: serde_json::Error) -> CdrError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::DeserializationError,
                "JSON deserialization failed",
            ),
        };

        CdrError::from_source(kind, description, err)
    }
}

/// Maps [`sqlx::Error`] to destination error kinds.
impl From<sqlx::Error> for CdrError {
    #[track_caller]
    fn from(err: sqlx::Error) -> CdrError {
        let kind = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut => ErrorKind::DestinationConnectionFailed,
            sqlx::Error::Configuration(_) => ErrorKind::ConfigError,
            _ => ErrorKind::DestinationQueryFailed,
        };

        CdrError::from_source(kind, "Database operation failed", err)
    }
}

/// Maps [`fred::error::Error`] to queue error kinds.
impl From<fred::error::Error> for CdrError {
    #[track_caller]
    fn from(err: fred::error::Error) -> CdrError {
        use fred::error::ErrorKind as RedisErrorKind;

        let (kind, description) = match err.kind() {
            RedisErrorKind::IO | RedisErrorKind::Timeout | RedisErrorKind::Canceled => (
                ErrorKind::QueueConnectionFailed,
                "Redis connection failed",
            ),
            RedisErrorKind::Auth => (ErrorKind::AuthenticationError, "Redis authentication failed"),
            RedisErrorKind::Config => (ErrorKind::ConfigError, "Redis configuration is invalid"),
            RedisErrorKind::Parse => (ErrorKind::ConversionError, "Redis response parsing failed"),
            _ => (ErrorKind::QueueOperationFailed, "Redis command failed"),
        };

        CdrError::from_source(kind, description, err)
    }
}
