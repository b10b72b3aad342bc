//! Error types for tablemap operations.

use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// The primary error type for all tablemap operations.
///
/// `Error` is `Clone`: a failed operation inside a transaction hands its
/// error to the caller and keeps a copy for the transaction's `end`.
#[derive(Debug, Clone)]
pub enum Error {
    /// Invalid table registration or use of an unregistered type
    Config(ConfigError),
    /// Update affected no row: the row is gone or its version moved on
    OptimisticLock(OptimisticLockError),
    /// Delete/get target does not exist
    NotFound(NotFoundError),
    /// A keyed statement touched an impossible number of rows
    Integrity(IntegrityError),
    /// Operation attempted on a transaction that already ended
    TransactionClosed,
    /// Opaque error raised by the driver/connection layer
    Driver(DriverError),
    /// Value conversion errors
    Type(TypeError),
    /// A record in a multi-record call failed
    Batch(BatchError),
    /// Custom error with message (typically raised by hooks)
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// The record type declares no fields
    NoFields,
    /// A named field does not exist on the record type
    UnknownField,
    /// A key/version field has an unsuitable type or role
    InvalidField,
    /// The type (or table name) is already registered
    DuplicateTable,
    /// The type was never registered with the mapper
    UnregisteredType,
    /// The table has no key fields but the operation needs them
    MissingKey,
    /// A table or column name is not a valid identifier
    InvalidIdentifier,
}

#[derive(Debug, Clone)]
pub struct OptimisticLockError {
    pub table: String,
    pub keys: Vec<Value>,
    /// The version value the update expected to find in storage.
    pub version: i64,
}

#[derive(Debug, Clone)]
pub struct NotFoundError {
    pub table: String,
    pub keys: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct IntegrityError {
    pub table: String,
    pub operation: &'static str,
    pub rows_affected: u64,
}

#[derive(Debug, Clone)]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// Failed to open or keep the connection
    Connection,
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, not null)
    Constraint,
    /// Database busy or locked
    Busy,
    /// Statement was interrupted
    Cancelled,
    /// Transaction begin/commit/rollback failure
    Transaction,
    /// Other database error
    Database,
}

#[derive(Debug, Clone)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BatchError {
    /// Zero-based position of the failing record.
    pub index: usize,
    pub source: Box<Error>,
}

impl Error {
    /// Build a configuration error.
    pub fn config(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            kind,
            message: message.into(),
        })
    }

    /// Build a driver error without a source.
    pub fn driver(kind: DriverErrorKind, sql: Option<&str>, message: impl Into<String>) -> Self {
        Error::Driver(DriverError {
            kind,
            sql: sql.map(str::to_string),
            message: message.into(),
            source: None,
        })
    }

    /// Is this worth retrying after reloading state (stale version, busy database)?
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::OptimisticLock(_) => true,
            Error::Driver(d) => matches!(d.kind, DriverErrorKind::Busy),
            Error::Batch(b) => b.source.is_retryable(),
            _ => false,
        }
    }

    pub fn is_optimistic_lock(&self) -> bool {
        matches!(self.root(), Error::OptimisticLock(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Error::NotFound(_))
    }

    /// The innermost error, looking through batch wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Batch(b) => b.source.root(),
            other => other,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Driver(d) => d.sql.as_deref(),
            Error::Batch(b) => b.source.sql(),
            _ => None,
        }
    }
}

fn fmt_keys(keys: &[Value]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::OptimisticLock(e) => write!(f, "Optimistic lock error: {}", e),
            Error::NotFound(e) => write!(f, "Not found: {}", e),
            Error::Integrity(e) => write!(f, "Integrity error: {}", e),
            Error::TransactionClosed => write!(f, "Transaction already ended"),
            Error::Driver(e) => write!(f, "Driver error: {}", e),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Batch(e) => write!(f, "Record {} failed: {}", e.index, e.source),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Driver(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Batch(e) => Some(e.source.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for OptimisticLockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row in '{}' with key ({}) is missing or no longer at version {}",
            self.table,
            fmt_keys(&self.keys),
            self.version
        )
    }
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no row in '{}' with key ({})",
            self.table,
            fmt_keys(&self.keys)
        )
    }
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on '{}' affected {} rows, expected exactly 1",
            self.operation, self.table, self.rows_affected
        )
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<OptimisticLockError> for Error {
    fn from(err: OptimisticLockError) -> Self {
        Error::OptimisticLock(err)
    }
}

impl From<NotFoundError> for Error {
    fn from(err: NotFoundError) -> Self {
        Error::NotFound(err)
    }
}

impl From<IntegrityError> for Error {
    fn from(err: IntegrityError) -> Self {
        Error::Integrity(err)
    }
}

impl From<DriverError> for Error {
    fn from(err: DriverError) -> Self {
        Error::Driver(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

/// Result type alias for tablemap operations.
pub type Result<T> = std::result::Result<T, Error>;
