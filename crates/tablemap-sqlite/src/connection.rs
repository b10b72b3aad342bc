//! Synchronous SQLite connection and transactions.
//!
//! One `sqlite3` handle sits behind a mutex. Statements are prepared, bound,
//! stepped to completion and finalized inside a single lock scope, so no
//! statement handle ever escapes this module.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::borrow_as_ptr)]

use crate::ffi;
use crate::types;
use std::cell::Cell;
use std::ffi::{CStr, CString, c_int};
use std::ops::BitOr;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};
use tablemap_core::{
    Connection, DriverErrorKind, Error, ExecResult, Executor, Result, Row, TransactionOps, Value,
    row::Columns,
};

/// `sqlite3_open_v2` flags.
///
/// Combine with `|`: `OpenFlags::read_write() | OpenFlags::URI`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags(c_int);

impl OpenFlags {
    pub const READ_ONLY: Self = Self(ffi::SQLITE_OPEN_READONLY);
    pub const READ_WRITE: Self = Self(ffi::SQLITE_OPEN_READWRITE);
    pub const CREATE: Self = Self(ffi::SQLITE_OPEN_CREATE);
    pub const URI: Self = Self(ffi::SQLITE_OPEN_URI);
    pub const NO_MUTEX: Self = Self(ffi::SQLITE_OPEN_NOMUTEX);
    pub const FULL_MUTEX: Self = Self(ffi::SQLITE_OPEN_FULLMUTEX);

    pub const fn read_only() -> Self {
        Self::READ_ONLY
    }

    /// Read-write on an existing database.
    pub const fn read_write() -> Self {
        Self::READ_WRITE
    }

    /// Read-write, creating the database file if it is missing.
    pub const fn create_read_write() -> Self {
        Self(ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw flags, defaulting to read-write-create when no access mode is set.
    fn bits(self) -> c_int {
        let mode = ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE;
        if self.0 & mode == 0 {
            self.0 | Self::create_read_write().0
        } else {
            self.0
        }
    }
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self::create_read_write()
    }
}

impl BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Where and how to open a database.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// File path, or `:memory:`.
    pub path: String,
    pub flags: OpenFlags,
    /// How long a statement waits on a locked database; 0 disables waiting.
    pub busy_timeout_ms: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self::memory()
    }
}

impl SqliteConfig {
    pub fn memory() -> Self {
        Self::file(":memory:")
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            flags: OpenFlags::default(),
            busy_timeout_ms: 5000,
        }
    }

    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

struct SqliteInner {
    db: *mut ffi::sqlite3,
}

impl SqliteInner {
    /// Whether SQLite reports an open transaction.
    ///
    /// SQLite may end one by itself, e.g. on `RAISE(ROLLBACK)` or a full disk.
    fn in_transaction(&self) -> bool {
        // SAFETY: db is open for the lifetime of the connection
        unsafe { ffi::sqlite3_get_autocommit(self.db) == 0 }
    }
}

// SAFETY: the handle is only touched while holding the connection's mutex.
unsafe impl Send for SqliteInner {}

/// A SQLite database connection.
///
/// There is a single handle per connection. While a [`SqliteTransaction`]
/// is open, every statement on the connection runs inside it, including
/// statements issued through the connection itself from another thread.
/// Such statements commit or roll back with the transaction.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .field("in_transaction", &self.in_transaction())
            .finish_non_exhaustive()
    }
}

/// Prepared statement, finalized on drop.
struct Statement(*mut ffi::sqlite3_stmt);

impl Drop for Statement {
    fn drop(&mut self) {
        // SAFETY: the pointer came from a successful sqlite3_prepare_v2
        unsafe {
            ffi::sqlite3_finalize(self.0);
        }
    }
}

impl SqliteConnection {
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::driver(
                DriverErrorKind::Connection,
                None,
                "database path contains a NUL byte",
            )
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        // SAFETY: c_path outlives the call; db receives the new handle
        let rc = unsafe {
            ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, config.flags.bits(), ptr::null())
        };

        if rc != ffi::SQLITE_OK {
            let reason = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: a failed open still hands back a handle to close
                unsafe {
                    let reason = ffi::errmsg(db);
                    ffi::sqlite3_close(db);
                    reason
                }
            };
            return Err(Error::driver(
                DriverErrorKind::Connection,
                None,
                format!("cannot open '{}': {}", config.path, reason),
            ));
        }

        if config.busy_timeout_ms > 0 {
            let timeout = c_int::try_from(config.busy_timeout_ms).unwrap_or(c_int::MAX);
            // SAFETY: db is open
            unsafe {
                ffi::sqlite3_busy_timeout(db, timeout);
            }
        }

        tracing::debug!(path = %config.path, "Opened SQLite database");
        Ok(Self {
            inner: Mutex::new(SqliteInner { db }),
            path: config.path.clone(),
        })
    }

    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(&SqliteConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether a transaction is currently open on this connection.
    pub fn in_transaction(&self) -> bool {
        self.lock().is_ok_and(|inner| inner.in_transaction())
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqliteInner>> {
        self.inner.lock().map_err(|_| {
            Error::driver(
                DriverErrorKind::Connection,
                None,
                "SQLite connection mutex poisoned",
            )
        })
    }

    /// Execute SQL directly without preparing (for DDL, multiple statements, etc.)
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        let inner = self.lock()?;
        exec_raw(inner.db, sql)
    }

    /// Prepare a statement and bind its parameters.
    fn prepare_bound(db: *mut ffi::sqlite3, sql: &str, params: &[Value]) -> Result<Statement> {
        let stmt = prepare_stmt(db, sql)?;

        for (i, param) in params.iter().enumerate() {
            let index = c_int::try_from(i + 1).map_err(|_| bind_error(db, sql, i + 1))?;
            // SAFETY: stmt is valid, index is 1-based
            let rc = unsafe { types::bind_value(stmt.0, index, param) };
            if rc != ffi::SQLITE_OK {
                return Err(bind_error(db, sql, i + 1));
            }
        }

        Ok(stmt)
    }

    /// Prepare and execute a query, returning all rows.
    fn query_sync(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let inner = self.lock()?;
        let stmt = Self::prepare_bound(inner.db, sql, params)?;

        // SAFETY: stmt is valid
        let col_count = unsafe { ffi::sqlite3_column_count(stmt.0) };
        let mut col_names = Vec::with_capacity(usize::try_from(col_count).unwrap_or(0));
        for i in 0..col_count {
            // SAFETY: stmt is valid and i is in range
            let name = unsafe { types::column_name(stmt.0, i) }.unwrap_or_else(|| format!("col{}", i));
            col_names.push(name);
        }
        let columns = Arc::new(Columns::new(col_names));

        let mut rows = Vec::new();
        loop {
            // SAFETY: stmt is valid
            let rc = unsafe { ffi::sqlite3_step(stmt.0) };
            match rc {
                ffi::SQLITE_ROW => {
                    let values = (0..col_count)
                        // SAFETY: stmt is valid, we just got SQLITE_ROW
                        .map(|i| unsafe { types::read_column(stmt.0, i) })
                        .collect();
                    rows.push(Row::shared(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => break,
                _ => return Err(step_error(inner.db, sql)),
            }
        }

        tracing::trace!(sql = %sql, rows = rows.len(), "SQLite query");
        Ok(rows)
    }

    /// Prepare and execute a statement, returning rows affected and the last rowid.
    fn execute_sync(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let inner = self.lock()?;
        let stmt = Self::prepare_bound(inner.db, sql, params)?;

        // SAFETY: stmt is valid
        let rc = unsafe { ffi::sqlite3_step(stmt.0) };
        drop(stmt);

        match rc {
            ffi::SQLITE_DONE | ffi::SQLITE_ROW => {
                // SAFETY: db is valid
                let (changes, rowid) = unsafe {
                    (
                        ffi::sqlite3_changes(inner.db),
                        ffi::sqlite3_last_insert_rowid(inner.db),
                    )
                };
                let changes = u64::try_from(changes).unwrap_or(0);
                tracing::trace!(sql = %sql, changes, "SQLite execute");
                Ok(ExecResult::new(changes, Some(rowid)))
            }
            _ => Err(step_error(inner.db, sql)),
        }
    }

    fn begin_sync(&self) -> Result<()> {
        let inner = self.lock()?;
        if inner.in_transaction() {
            return Err(Error::driver(
                DriverErrorKind::Transaction,
                None,
                "Already in a transaction",
            ));
        }
        exec_raw(inner.db, "BEGIN IMMEDIATE")?;
        tracing::debug!(path = %self.path, "BEGIN");
        Ok(())
    }

    fn finish_sync(&self, sql: &'static str) -> Result<()> {
        let inner = self.lock()?;
        if !inner.in_transaction() {
            if sql == "ROLLBACK" {
                // SQLite already rolled the transaction back
                tracing::debug!(path = %self.path, "ROLLBACK skipped, no transaction active");
                return Ok(());
            }
            return Err(Error::driver(
                DriverErrorKind::Transaction,
                Some(sql),
                "Not in a transaction",
            ));
        }
        // A failed COMMIT (e.g. SQLITE_BUSY) leaves the transaction open for ROLLBACK
        exec_raw(inner.db, sql)?;
        tracing::debug!(path = %self.path, "{}", sql);
        Ok(())
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.lock() {
            if !inner.db.is_null() {
                // SAFETY: db is valid and no statements outlive the connection
                unsafe {
                    ffi::sqlite3_close(inner.db);
                }
            }
        }
    }
}

impl Executor for SqliteConnection {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        self.execute_sync(sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.query_sync(sql, params)
    }
}

impl Connection for SqliteConnection {
    type Tx<'conn>
        = SqliteTransaction<'conn>
    where
        Self: 'conn;

    fn begin(&self) -> Result<Self::Tx<'_>> {
        self.begin_sync()?;
        Ok(SqliteTransaction::new(self))
    }
}

/// A SQLite transaction.
///
/// Dropping it before `commit` or `rollback` succeeded rolls it back.
pub struct SqliteTransaction<'conn> {
    conn: &'conn SqliteConnection,
    finished: Cell<bool>,
}

impl<'conn> SqliteTransaction<'conn> {
    fn new(conn: &'conn SqliteConnection) -> Self {
        Self {
            conn,
            finished: Cell::new(false),
        }
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished.get() {
            if let Err(e) = self.conn.finish_sync("ROLLBACK") {
                tracing::warn!(error = %e, "Rollback of abandoned transaction failed");
            }
        }
    }
}

impl Executor for SqliteTransaction<'_> {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        self.conn.execute_sync(sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.conn.query_sync(sql, params)
    }
}

impl TransactionOps for SqliteTransaction<'_> {
    fn commit(&self) -> Result<()> {
        self.conn.finish_sync("COMMIT")?;
        self.finished.set(true);
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        // Prevent a second rollback in drop even if this one fails
        self.finished.set(true);
        self.conn.finish_sync("ROLLBACK")
    }
}

// Helper functions

fn exec_raw(db: *mut ffi::sqlite3, sql: &str) -> Result<()> {
    let c_sql = CString::new(sql)
        .map_err(|_| Error::driver(DriverErrorKind::Syntax, Some(sql), "SQL contains null byte"))?;

    let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();

    // SAFETY: All pointers are valid
    let rc = unsafe { ffi::sqlite3_exec(db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg) };

    if rc != ffi::SQLITE_OK {
        let msg = if errmsg.is_null() {
            ffi::error_string(rc).to_string()
        } else {
            // SAFETY: errmsg was allocated by SQLite and must be freed by it
            unsafe {
                let msg = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
                ffi::sqlite3_free(errmsg.cast());
                msg
            }
        };
        return Err(Error::driver(error_code_to_kind(rc), Some(sql), msg));
    }

    Ok(())
}

fn prepare_stmt(db: *mut ffi::sqlite3, sql: &str) -> Result<Statement> {
    let c_sql = CString::new(sql)
        .map_err(|_| Error::driver(DriverErrorKind::Syntax, Some(sql), "SQL contains null byte"))?;
    let len = c_int::try_from(c_sql.as_bytes().len())
        .map_err(|_| Error::driver(DriverErrorKind::Syntax, Some(sql), "SQL text too long"))?;

    let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();

    // SAFETY: All pointers are valid
    let rc = unsafe { ffi::sqlite3_prepare_v2(db, c_sql.as_ptr(), len, &mut stmt, ptr::null_mut()) };

    if rc != ffi::SQLITE_OK {
        if !stmt.is_null() {
            // SAFETY: stmt was returned by prepare
            unsafe { ffi::sqlite3_finalize(stmt) };
        }
        return Err(step_error(db, sql));
    }

    Ok(Statement(stmt))
}

fn bind_error(db: *mut ffi::sqlite3, sql: &str, param_index: usize) -> Error {
    // SAFETY: db is valid
    let msg = unsafe { ffi::errmsg(db) };
    Error::driver(
        DriverErrorKind::Database,
        Some(sql),
        format!("Failed to bind parameter {}: {}", param_index, msg),
    )
}

fn step_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid
    let (msg, code) = unsafe { (ffi::errmsg(db), ffi::sqlite3_errcode(db)) };
    Error::driver(error_code_to_kind(code), Some(sql), msg)
}

fn error_code_to_kind(code: c_int) -> DriverErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => DriverErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => DriverErrorKind::Busy,
        ffi::SQLITE_INTERRUPT => DriverErrorKind::Cancelled,
        ffi::SQLITE_ERROR => DriverErrorKind::Syntax,
        _ => DriverErrorKind::Database,
    }
}
