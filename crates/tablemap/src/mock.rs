//! Scripted in-memory connection for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tablemap_core::{
    Connection, DriverErrorKind, Error, ExecResult, Executor, Result, Row, TransactionOps, Value,
};

#[derive(Default)]
struct MockState {
    log: Vec<String>,
    params: Vec<Vec<Value>>,
    exec_results: VecDeque<Result<ExecResult>>,
    query_results: VecDeque<Result<Vec<Row>>>,
    fail_commit: bool,
}

/// Records every statement; answers from queued results.
///
/// With nothing queued, `execute` reports one affected row with insert id 1
/// and `query` returns no rows.
#[derive(Clone, Default)]
pub(crate) struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn push_exec(&self, result: Result<ExecResult>) {
        self.state().exec_results.push_back(result);
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.state().query_results.push_back(Ok(rows));
    }

    pub fn fail_commit(&self) {
        self.state().fail_commit = true;
    }

    /// SQL text of every statement, plus BEGIN / COMMIT / ROLLBACK markers.
    pub fn log(&self) -> Vec<String> {
        self.state().log.clone()
    }

    /// Parameters of every executed statement or query.
    pub fn params(&self) -> Vec<Vec<Value>> {
        self.state().params.clone()
    }
}

impl Executor for MockConnection {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let mut state = self.state();
        state.log.push(sql.to_string());
        state.params.push(params.to_vec());
        state
            .exec_results
            .pop_front()
            .unwrap_or(Ok(ExecResult::new(1, Some(1))))
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut state = self.state();
        state.log.push(sql.to_string());
        state.params.push(params.to_vec());
        state.query_results.pop_front().unwrap_or(Ok(Vec::new()))
    }
}

impl Connection for MockConnection {
    type Tx<'conn>
        = MockTransaction<'conn>
    where
        Self: 'conn;

    fn begin(&self) -> Result<Self::Tx<'_>> {
        self.state().log.push("BEGIN".to_string());
        Ok(MockTransaction { conn: self })
    }
}

pub(crate) struct MockTransaction<'conn> {
    conn: &'conn MockConnection,
}

impl Executor for MockTransaction<'_> {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        self.conn.execute(sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.conn.query(sql, params)
    }
}

impl TransactionOps for MockTransaction<'_> {
    fn commit(&self) -> Result<()> {
        let mut state = self.conn.state();
        state.log.push("COMMIT".to_string());
        if state.fail_commit {
            return Err(Error::driver(
                DriverErrorKind::Transaction,
                Some("COMMIT"),
                "commit refused",
            ));
        }
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.conn.state().log.push("ROLLBACK".to_string());
        Ok(())
    }
}
