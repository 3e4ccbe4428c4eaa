//! Error types and result definitions for the merge pipeline.
//!
//! [`RiversError`] carries an [`ErrorKind`] used to decide how a failure is handled,
//! a static description, an optional dynamic detail (for store failures this is the
//! database message, which is what the transient failure classifier inspects), the
//! SQLSTATE code of database failures and an optional source error.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for pipeline operations.
pub type RiversResult<T> = Result<T, RiversError>;

/// Main error type of the merge pipeline.
#[derive(Debug, Clone)]
pub struct RiversError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    sql_state: Option<String>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

/// Categories of failures that can happen while merging rivers.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Connection Errors
    SourceConnectionFailed,
    DestinationConnectionFailed,

    // Query & Execution Errors
    SourceQueryFailed,
    DestinationQueryFailed,

    // Schema Errors
    DestinationTableMissing,
    InvalidTableName,

    // Data Errors
    InvalidData,

    // Unknown / Uncategorized
    Unknown,
}

impl RiversError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the dynamic detail of this error, if any.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the SQLSTATE code reported by the database, if any.
    pub fn sql_state(&self) -> Option<&str> {
        self.sql_state.as_deref()
    }

    /// Returns the callsite where this error was created.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches an originating error and returns the modified instance.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Sets the SQLSTATE code and returns the modified instance.
    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
    ) -> Self {
        RiversError {
            kind,
            description,
            detail,
            sql_state: None,
            source: None,
            location: Location::caller(),
        }
    }
}

/// Errors compare equal when their kinds match, which is what tests and retry
/// decisions care about.
impl PartialEq for RiversError {
    fn eq(&self, other: &RiversError) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for RiversError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        if let Some(detail) = &self.detail {
            write!(f, "\n  Detail:")?;
            for line in detail.lines() {
                write!(f, "\n    {line}")?;
            }
        }

        Ok(())
    }
}

impl error::Error for RiversError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

/// Creates a [`RiversError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for RiversError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> RiversError {
        RiversError::from_components(kind, Cow::Borrowed(desc), None)
    }
}

/// Creates a [`RiversError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for RiversError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> RiversError {
        RiversError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()))
    }
}

/// Builds a [`RiversError`] for a failed database call.
///
/// For database errors the detail is the server message and the SQLSTATE code is
/// kept, so that the transient failure classifier can match on both. Other errors
/// get the driver's rendering as detail.
#[track_caller]
pub(crate) fn sqlx_error(
    kind: ErrorKind,
    description: &'static str,
    err: sqlx::Error,
) -> RiversError {
    let (detail, sql_state) = match &err {
        sqlx::Error::Database(db_err) => (
            db_err.message().to_string(),
            db_err.code().map(|code| code.into_owned()),
        ),
        other => (other.to_string(), None),
    };

    let mut error =
        RiversError::from_components(kind, Cow::Borrowed(description), Some(Cow::Owned(detail)));
    error.sql_state = sql_state;

    error.with_source(err)
}

/// Converts driver errors that were not mapped at the call site.
///
/// Server errors are classified as destination query failures, transport errors
/// as connection failures.
impl From<sqlx::Error> for RiversError {
    #[track_caller]
    fn from(err: sqlx::Error) -> RiversError {
        let kind = match &err {
            sqlx::Error::Database(_) => ErrorKind::DestinationQueryFailed,
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => ErrorKind::DestinationConnectionFailed,
            sqlx::Error::RowNotFound | sqlx::Error::ColumnDecode { .. } => ErrorKind::InvalidData,
            _ => ErrorKind::Unknown,
        };

        sqlx_error(kind, "Database operation failed", err)
    }
}
