//! tablemap - map Rust records onto relational tables.
//!
//! tablemap binds record types to database tables without hand-written SQL
//! for routine CRUD:
//!
//! - Registration builds a descriptor per record type from explicit field
//!   accessors; no runtime reflection
//! - INSERT / UPDATE / DELETE / SELECT-by-key generated once per table
//! - Optimistic locking through an integer version column
//! - Opt-in lifecycle hooks around every operation
//! - Transactions with a single commit-or-rollback exit
//! - Raw SQL for everything else, mapped back onto records by column name
//!
//! # Quick Start
//!
//! ```ignore
//! use tablemap::prelude::*;
//! use tablemap_sqlite::SqliteConnection;
//!
//! #[derive(Debug, Default)]
//! struct Product {
//!     id: i64,
//!     description: String,
//!     unit_price: i32,
//!     version: i32,
//! }
//!
//! impl Record for Product {
//!     fn fields() -> Vec<Field<Self>> {
//!         vec![
//!             field!(Product, id, SqlType::BigInt),
//!             field!(Product, description, SqlType::Text),
//!             field!(Product, unit_price, SqlType::Integer),
//!             field!(Product, version, SqlType::Integer),
//!         ]
//!     }
//! }
//!
//! fn run() -> Result<()> {
//!     let mut mapper = Mapper::new(SqliteConnection::open_memory()?);
//!     mapper
//!         .add_table_with_name::<Product>("products")?
//!         .set_keys(true, &["id"])?
//!         .set_version_col("version")?;
//!     mapper.create_tables()?;
//!
//!     let mut socks = Product { description: "Wool socks".into(), unit_price: 450, ..Default::default() };
//!     mapper.insert_one(&mut socks)?;
//!
//!     socks.unit_price = 500;
//!     mapper.update(&mut socks)?; // version 1 -> 2
//!
//!     let tx = mapper.begin()?;
//!     tx.delete(&mut socks)?;
//!     tx.end()
//! }
//! ```

mod context;
pub mod ddl;
pub mod descriptor;
pub mod dialect;
pub mod executor;
pub mod hooks;
pub mod mapper;
mod ops;
pub mod record;
pub mod statement;
pub mod trace;
pub mod transaction;

#[cfg(test)]
mod mock;

pub use descriptor::{ColumnDef, TableHandle, TableInfo, TableMap};
pub use dialect::{Dialect, MySqlDialect, PostgresDialect, SqliteDialect};
pub use executor::SqlExecutor;
pub use hooks::{Hook, Hooks};
pub use mapper::{Mapper, MapperBuilder};
pub use record::{Field, Record};
pub use trace::{JsonLinesSink, MemorySink, TraceEvent, TraceSink, TracingSink};
pub use transaction::Transaction;

pub use tablemap_core::{
    ConfigError, ConfigErrorKind, Connection, DriverError, DriverErrorKind, Error, ExecResult,
    Executor, FromValue, IntegrityError, NotFoundError, OptimisticLockError, Result, Row, SqlType,
    TransactionOps, TypeError, Value,
};

/// Commonly used items.
pub mod prelude {
    pub use crate::{
        Error, Field, Hooks, Mapper, MapperBuilder, Record, Result, SqlExecutor, SqlType,
        Transaction, Value, field,
    };
}
