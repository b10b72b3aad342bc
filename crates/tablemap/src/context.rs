//! Execution context and row-count interpretation.
//!
//! An [`ExecutionContext`] runs statements against either the ambient
//! connection or an open transaction, feeds the trace sink, and turns the
//! driver's row counts into mapper outcomes.

use crate::trace::{TraceEvent, TraceSink};
use std::time::Instant;
use tablemap_core::{
    Error, ExecResult, Executor, IntegrityError, NotFoundError, OptimisticLockError, Result, Row,
    Value,
};

pub(crate) struct ExecutionContext<'a> {
    executor: &'a dyn Executor,
    transactional: bool,
    trace: Option<&'a dyn TraceSink>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        executor: &'a dyn Executor,
        transactional: bool,
        trace: Option<&'a dyn TraceSink>,
    ) -> Self {
        Self {
            executor,
            transactional,
            trace,
        }
    }

    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        self.traced(sql, params, || self.executor.execute(sql, params))
    }

    pub fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.traced(sql, params, || self.executor.query(sql, params))
    }

    fn traced<R>(&self, sql: &str, params: &[Value], run: impl FnOnce() -> Result<R>) -> Result<R> {
        let Some(sink) = self.trace else {
            return run();
        };
        let start = Instant::now();
        let result = run();
        sink.record(&TraceEvent {
            sql: sql.to_string(),
            params: params.to_vec(),
            elapsed: start.elapsed(),
            transactional: self.transactional,
            error: result.as_ref().err().map(ToString::to_string),
        });
        result
    }
}

/// State of a versioned UPDATE once the driver reported its row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateState {
    /// Exactly one row matched: the new version is in storage.
    Confirmed,
    /// No row matched the key and version.
    Stale,
    /// No row matched an unversioned update.
    Unmatched,
}

impl UpdateState {
    /// Classify an UPDATE's row count. `versioned` means the WHERE clause
    /// also required the old version.
    pub fn from_rows(table: &str, rows_affected: u64, versioned: bool) -> Result<Self> {
        match (rows_affected, versioned) {
            (1, _) => Ok(UpdateState::Confirmed),
            (0, true) => Ok(UpdateState::Stale),
            (0, false) => Ok(UpdateState::Unmatched),
            (n, _) => Err(integrity(table, "UPDATE", n)),
        }
    }
}

pub(crate) fn stale(table: &str, keys: Vec<Value>, version: i64) -> Error {
    Error::OptimisticLock(OptimisticLockError {
        table: table.to_string(),
        keys,
        version,
    })
}

pub(crate) fn not_found(table: &str, keys: Vec<Value>) -> Error {
    Error::NotFound(NotFoundError {
        table: table.to_string(),
        keys,
    })
}

pub(crate) fn integrity(table: &str, operation: &'static str, rows_affected: u64) -> Error {
    Error::Integrity(IntegrityError {
        table: table.to_string(),
        operation,
        rows_affected,
    })
}

/// An INSERT must write exactly one row.
pub(crate) fn confirm_insert(table: &str, rows_affected: u64) -> Result<()> {
    if rows_affected == 1 {
        Ok(())
    } else {
        Err(integrity(table, "INSERT", rows_affected))
    }
}

/// A DELETE by key removes one row; none means the row is gone.
pub(crate) fn confirm_delete(table: &str, keys: Vec<Value>, rows_affected: u64) -> Result<()> {
    match rows_affected {
        1 => Ok(()),
        0 => Err(not_found(table, keys)),
        n => Err(integrity(table, "DELETE", n)),
    }
}
