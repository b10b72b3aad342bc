//! Transactions.
//!
//! A [`Transaction`] exposes the mapper's operations inside one database
//! transaction. It is finished exactly once, by [`Transaction::end`]:
//!
//! - if any operation failed, `end` rolls back and returns that error;
//! - otherwise it commits, and if the commit fails it rolls back and
//!   returns the commit error.
//!
//! Every call after `end` fails with `Error::TransactionClosed`. A
//! transaction dropped without `end` is rolled back by the driver.
//!
//! # Example
//!
//! ```rust,ignore
//! let tx = mapper.begin()?;
//! tx.insert(&mut [a, b, c])?;
//! tx.update(&mut invoice)?;
//! tx.end()?;
//! ```

use crate::context::ExecutionContext;
use crate::executor::SqlExecutor;
use crate::mapper::Mapper;
use crate::ops::Ops;
use crate::record::Record;
use std::cell::{Cell, RefCell};
use tablemap_core::{Connection, Error, ExecResult, Result, Row, TransactionOps, Value};

/// A single-use unit of work over the mapper's connection.
pub struct Transaction<'m, C: Connection + 'm> {
    mapper: &'m Mapper<C>,
    tx: C::Tx<'m>,
    closed: Cell<bool>,
    /// First error any operation returned.
    failed: RefCell<Option<Error>>,
}

impl<'m, C: Connection + 'm> Transaction<'m, C> {
    pub(crate) fn new(mapper: &'m Mapper<C>, tx: C::Tx<'m>) -> Self {
        Self {
            mapper,
            tx,
            closed: Cell::new(false),
            failed: RefCell::new(None),
        }
    }

    /// Whether `end` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Whether an operation failed, so `end` will roll back.
    pub fn has_failed(&self) -> bool {
        self.failed.borrow().is_some()
    }

    fn context(&self) -> ExecutionContext<'_> {
        ExecutionContext::new(&self.tx, true, self.mapper.trace())
    }

    fn ops(&self) -> Ops<'_> {
        Ops {
            registry: self.mapper.registry(),
            dialect: self.mapper.dialect(),
            ctx: self.context(),
            exec: self,
        }
    }

    /// Run `op` unless the transaction is closed, remembering its failure.
    ///
    /// Operations nest when hooks issue SQL through the transaction; the
    /// error kept is the one the outermost failing call returned.
    fn guard<R>(&self, op: impl FnOnce() -> Result<R>) -> Result<R> {
        if self.closed.get() {
            return Err(Error::TransactionClosed);
        }
        let already_failed = self.has_failed();
        let result = op();
        if let Err(e) = &result {
            if !already_failed {
                *self.failed.borrow_mut() = Some(e.clone());
            }
        }
        result
    }

    /// Insert records in order. See [`Mapper::insert`].
    pub fn insert<T: Record>(&self, records: &mut [T]) -> Result<()> {
        self.guard(|| self.ops().insert(records))
    }

    pub fn insert_one<T: Record>(&self, record: &mut T) -> Result<()> {
        self.insert(std::slice::from_mut(record))
    }

    /// Update a record by key. See [`Mapper::update`].
    pub fn update<T: Record>(&self, record: &mut T) -> Result<bool> {
        self.guard(|| self.ops().update(record))
    }

    /// Delete a record by key. See [`Mapper::delete`].
    pub fn delete<T: Record>(&self, record: &mut T) -> Result<bool> {
        self.guard(|| self.ops().delete(record))
    }

    pub fn get<T: Record>(&self, keys: &[Value]) -> Result<T> {
        self.guard(|| self.ops().get(keys))
    }

    pub fn select<T: Record>(&self, sql: &str, params: &[Value]) -> Result<Vec<T>> {
        self.guard(|| self.ops().select(sql, params))
    }

    pub fn select_one<T: Record>(&self, sql: &str, params: &[Value]) -> Result<T> {
        self.guard(|| self.ops().select_one(sql, params))
    }

    /// Commit, or roll back if any operation failed.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn end(&self) -> Result<()> {
        if self.closed.replace(true) {
            return Err(Error::TransactionClosed);
        }

        let failed = self.failed.borrow_mut().take();
        if let Some(error) = failed {
            tracing::debug!(error = %error, "Rolling back failed transaction");
            if let Err(rb) = self.tx.rollback() {
                tracing::warn!(error = %rb, "Rollback failed");
            }
            return Err(error);
        }

        match self.tx.commit() {
            Ok(()) => {
                tracing::debug!("Transaction committed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Commit failed, rolling back");
                if let Err(rb) = self.tx.rollback() {
                    tracing::warn!(error = %rb, "Rollback after failed commit failed");
                }
                Err(e)
            }
        }
    }
}

impl<'m, C: Connection + 'm> SqlExecutor for Transaction<'m, C> {
    fn exec(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        self.guard(|| self.context().execute(sql, params))
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.guard(|| self.context().query(sql, params))
    }
}

impl<'m, C: Connection + 'm> Drop for Transaction<'m, C> {
    fn drop(&mut self) {
        if !self.closed.get() {
            tracing::warn!("Transaction dropped without end; rolling back");
        }
    }
}

impl<'m, C: Connection + 'm> std::fmt::Debug for Transaction<'m, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("closed", &self.closed.get())
            .field("failed", &self.has_failed())
            .finish_non_exhaustive()
    }
}
