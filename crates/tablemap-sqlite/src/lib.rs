//! SQLite driver for tablemap.
//!
//! [`SqliteConnection`] implements the `Connection` boundary from
//! `tablemap-core` on top of the SQLite amalgamation bundled by
//! `libsqlite3-sys`, so a `Mapper` can run against a file or an in-memory
//! database with no system library installed.
//!
//! ```rust,ignore
//! use tablemap_core::{Executor, Value};
//! use tablemap_sqlite::{OpenFlags, SqliteConfig, SqliteConnection};
//!
//! let conn = SqliteConnection::open(
//!     &SqliteConfig::file("shop.db")
//!         .flags(OpenFlags::create_read_write())
//!         .busy_timeout(1_000),
//! )?;
//! conn.execute_raw("CREATE TABLE IF NOT EXISTS tags (name TEXT PRIMARY KEY)")?;
//! conn.execute("INSERT INTO tags (name) VALUES (?)", &[Value::from("wool")])?;
//! ```
//!
//! Values bind by variant: integers of every width as INTEGER, `Double` as
//! REAL, `Text` and `Json` as TEXT, `Bytes` as BLOB and `Bool` as 0 / 1.
//! Reads return `Int` for integers that fit in 32 bits and `BigInt` for the
//! rest; record fields convert either way.
//!
//! Transactions use `BEGIN IMMEDIATE` so the write lock is taken up front.
//! Only one may be open per connection, and one dropped unfinished is rolled
//! back.
//! While one is open, statements issued on the connection outside it run
//! inside it too, so they commit or roll back with the transaction.

#![allow(unsafe_code)]

pub mod connection;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection, SqliteTransaction};

/// Version string of the linked SQLite library, e.g. `3.46.0`.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Version as `major * 1_000_000 + minor * 1_000 + patch`.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}

/// Whether the linked library is at least `major.minor`.
pub fn sqlite_at_least(major: i32, minor: i32) -> bool {
    sqlite_version_number() >= major * 1_000_000 + minor * 1_000
}
