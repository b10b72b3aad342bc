//! Raw SQL surface shared by the mapper and its transactions.

use tablemap_core::{ExecResult, FromValue, Result, Row, Value};

/// Run hand-written SQL in the current context.
///
/// Implemented by [`Mapper`](crate::Mapper) (ambient connection) and
/// [`Transaction`](crate::Transaction). Hooks receive the active one as
/// `&dyn SqlExecutor`, so SQL they issue joins the running transaction.
pub trait SqlExecutor {
    /// Execute a statement (INSERT, UPDATE, DELETE, DDL).
    fn exec(&self, sql: &str, params: &[Value]) -> Result<ExecResult>;

    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// First column of the first row as an integer; 0 when there is no row.
    fn select_int(&self, sql: &str, params: &[Value]) -> Result<i64> {
        Ok(self.select_nullable_int(sql, params)?.unwrap_or(0))
    }

    /// First column of the first row; `None` when there is no row or it is NULL.
    fn select_nullable_int(&self, sql: &str, params: &[Value]) -> Result<Option<i64>> {
        first_value(&self.query(sql, params)?)
    }

    /// First column of the first row as text; empty when there is no row.
    fn select_str(&self, sql: &str, params: &[Value]) -> Result<String> {
        Ok(self.select_nullable_str(sql, params)?.unwrap_or_default())
    }

    fn select_nullable_str(&self, sql: &str, params: &[Value]) -> Result<Option<String>> {
        first_value(&self.query(sql, params)?)
    }
}

fn first_value<V: FromValue>(rows: &[Row]) -> Result<Option<V>> {
    match rows.first() {
        Some(row) if !row.is_empty() => row.get_as::<Option<V>>(0),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(Vec<Row>);

    impl SqlExecutor for Canned {
        fn exec(&self, _sql: &str, _params: &[Value]) -> Result<ExecResult> {
            Ok(ExecResult::default())
        }

        fn query(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            Ok(self.0.clone())
        }
    }

    fn one(value: Value) -> Canned {
        Canned(vec![Row::new(vec!["v".to_string()], vec![value])])
    }

    #[test]
    fn test_select_int() {
        assert_eq!(one(Value::Int(42)).select_int("q", &[]).unwrap(), 42);
        assert_eq!(Canned(vec![]).select_int("q", &[]).unwrap(), 0);
        assert_eq!(one(Value::Null).select_nullable_int("q", &[]).unwrap(), None);
    }

    #[test]
    fn test_select_str() {
        let exec = one(Value::Text("socks".into()));
        assert_eq!(exec.select_str("q", &[]).unwrap(), "socks");
        assert_eq!(Canned(vec![]).select_str("q", &[]).unwrap(), "");
        assert_eq!(one(Value::Null).select_nullable_str("q", &[]).unwrap(), None);
    }

    #[test]
    fn test_select_int_rejects_text() {
        assert!(one(Value::Text("x".into())).select_int("q", &[]).is_err());
    }

    #[test]
    fn test_object_safe() {
        let exec: &dyn SqlExecutor = &one(Value::BigInt(7));
        assert_eq!(exec.select_int("q", &[]).unwrap(), 7);
    }
}
