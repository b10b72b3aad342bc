//! Database connection traits.
//!
//! This module defines the driver boundary the mapper consumes:
//!
//! - [`Executor`] - run a statement or a query
//! - [`Connection`] - an ambient connection that can open transactions
//! - [`TransactionOps`] - an open transaction that can commit or roll back
//!
//! All calls are synchronous: each blocks until the database round-trip
//! completes. Timeouts and cancellation belong to the driver.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// Outcome of a data-modifying statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    /// Number of rows inserted, updated or deleted.
    pub rows_affected: u64,
    /// Row id assigned by the database to the last inserted row, if any.
    pub last_insert_id: Option<i64>,
}

impl ExecResult {
    pub const fn new(rows_affected: u64, last_insert_id: Option<i64>) -> Self {
        Self {
            rows_affected,
            last_insert_id,
        }
    }
}

/// Something that can run SQL: the ambient connection or an open transaction.
///
/// # Example
///
/// ```rust,ignore
/// let res = conn.execute("UPDATE products SET unit_price = ? WHERE id = ?", &[Value::Int(450), Value::BigInt(1)])?;
/// assert_eq!(res.rows_affected, 1);
/// ```
pub trait Executor {
    /// Execute a statement (INSERT, UPDATE, DELETE, DDL).
    fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult>;

    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;
}

/// A database connection capable of executing statements and opening
/// transactions.
///
/// Implementations must be `Send + Sync` so a mapper can be shared between
/// threads once registration is complete.
pub trait Connection: Executor + Send + Sync {
    /// The transaction type returned by this connection.
    type Tx<'conn>: TransactionOps
    where
        Self: 'conn;

    /// Begin a transaction.
    fn begin(&self) -> Result<Self::Tx<'_>>;
}

/// An open database transaction.
///
/// `commit` and `rollback` take `&self` so a caller can still roll back after
/// a failed commit. Dropping a transaction that was never finalized must roll
/// it back.
pub trait TransactionOps: Executor {
    /// Commit the transaction, making all changes permanent.
    fn commit(&self) -> Result<()>;

    /// Rollback the transaction, discarding all changes.
    fn rollback(&self) -> Result<()>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        (**self).execute(sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl Executor for Fixed {
        fn execute(&self, _sql: &str, _params: &[Value]) -> Result<ExecResult> {
            Ok(ExecResult::new(1, Some(42)))
        }

        fn query(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            Ok(vec![Row::new(vec!["n".to_string()], vec![Value::Int(1)])])
        }
    }

    #[test]
    fn test_exec_result_default() {
        let res = ExecResult::default();
        assert_eq!(res.rows_affected, 0);
        assert!(res.last_insert_id.is_none());
    }

    #[test]
    fn test_executor_through_reference() {
        let exec = Fixed;
        let by_ref: &dyn Executor = &exec;
        assert_eq!(by_ref.execute("X", &[]).unwrap().last_insert_id, Some(42));
        assert_eq!((&exec).query("Q", &[]).unwrap().len(), 1);
    }
}
