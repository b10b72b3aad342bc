//! Core types and traits for tablemap.
//!
//! This crate provides the foundational abstractions shared by the mapper and
//! its drivers:
//!
//! - `Value` and `Row` for parameters and results
//! - `Error` with the mapper's error taxonomy
//! - `Executor`, `Connection` and `TransactionOps` for the driver boundary
//! - `SqlType` and identifier helpers used during registration

pub mod connection;
pub mod error;
pub mod identifiers;
pub mod row;
pub mod types;
pub mod value;

pub use connection::{Connection, ExecResult, Executor, TransactionOps};
pub use error::{
    BatchError, ConfigError, ConfigErrorKind, DriverError, DriverErrorKind, Error, IntegrityError,
    NotFoundError, OptimisticLockError, Result, TypeError,
};
pub use identifiers::{default_column_name, is_valid_identifier, quote_ident, quote_ident_mysql};
pub use row::{FromValue, Row};
pub use types::SqlType;
pub use value::Value;
