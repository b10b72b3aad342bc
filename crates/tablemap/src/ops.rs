//! Insert, update, delete and load flows shared by `Mapper` and `Transaction`.

use crate::context::{self, ExecutionContext, UpdateState};
use crate::descriptor::{Registry, TableMap};
use crate::dialect::Dialect;
use crate::executor::SqlExecutor;
use crate::hooks::{self, Hook};
use crate::record::{Field, Record};
use crate::statement::{Bind, Statement};
use tablemap_core::{
    BatchError, ConfigErrorKind, DriverErrorKind, Error, Result, Row, Value, row::with_column,
};

/// Everything one mapped operation needs.
pub(crate) struct Ops<'a> {
    pub registry: &'a Registry,
    pub dialect: &'a dyn Dialect,
    pub ctx: ExecutionContext<'a>,
    /// Handed to hooks: the mapper or transaction running the operation.
    pub exec: &'a dyn SqlExecutor,
}

impl Ops<'_> {
    /// Insert each record in order, stopping at the first failure.
    ///
    /// With more than one record the error is wrapped in `Error::Batch`
    /// carrying the failing index.
    pub fn insert<T: Record>(&self, records: &mut [T]) -> Result<()> {
        let table = self.registry.get::<T>()?;
        let many = records.len() > 1;

        for (index, record) in records.iter_mut().enumerate() {
            if let Err(e) = self.insert_one(table, record) {
                tracing::debug!(
                    table = %table.table_name(),
                    index,
                    error = %e,
                    "Insert failed"
                );
                return Err(if many {
                    Error::Batch(BatchError {
                        index,
                        source: Box::new(e),
                    })
                } else {
                    e
                });
            }
        }
        Ok(())
    }

    fn insert_one<T: Record>(&self, table: &TableMap<T>, record: &mut T) -> Result<()> {
        hooks::invoke(Hook::PreInsert, record, self.exec)?;

        let info = table.info();
        let fields = table.fields();

        // A new row starts at version 1
        let previous = match info.version {
            Some(v) => {
                let old = fields[v].get(record);
                fields[v].set(record, &Value::BigInt(1))?;
                Some((v, old))
            }
            None => None,
        };

        let stmt = &table.statements(self.dialect).insert;
        if let Err(e) = self.run_insert(table, stmt, record) {
            if let Some((v, old)) = previous {
                if let Err(restore) = fields[v].set(record, &old) {
                    tracing::warn!(error = %restore, "Failed to restore version after insert error");
                }
            }
            return Err(e);
        }

        tracing::trace!(table = %info.table, "Inserted row");
        hooks::invoke(Hook::PostInsert, record, self.exec)
    }

    fn run_insert<T>(&self, table: &TableMap<T>, stmt: &Statement, record: &mut T) -> Result<()> {
        let info = table.info();
        let fields = table.fields();
        let params = bind_params(fields, &stmt.binds, record)?;

        let generated = if stmt.returning {
            let rows = self.ctx.query(&stmt.sql, &params)?;
            context::confirm_insert(&info.table, u64::try_from(rows.len()).unwrap_or(u64::MAX))?;
            rows.first().and_then(|row| row.get(0)).cloned()
        } else {
            let res = self.ctx.execute(&stmt.sql, &params)?;
            context::confirm_insert(&info.table, res.rows_affected)?;
            res.last_insert_id.map(Value::BigInt)
        };

        if info.auto_increment() {
            let key = info.keys[0];
            let value = generated.ok_or_else(|| {
                Error::driver(
                    DriverErrorKind::Database,
                    Some(&stmt.sql),
                    "driver reported no generated key",
                )
            })?;
            fields[key].set(record, &value)?;
        }
        Ok(())
    }

    /// Update a record by key. Returns whether a row was changed.
    pub fn update<T: Record>(&self, record: &mut T) -> Result<bool> {
        let table = self.registry.get::<T>()?;
        let info = table.info();
        info.require_keys()?;
        let stmt = table
            .statements(self.dialect)
            .update
            .as_ref()
            .ok_or_else(|| {
                Error::config(
                    ConfigErrorKind::InvalidField,
                    format!("table '{}' has no column to update", info.table),
                )
            })?;

        hooks::invoke(Hook::PreUpdate, record, self.exec)?;

        let fields = table.fields();
        let params = bind_params(fields, &stmt.binds, record)?;
        let res = self.ctx.execute(&stmt.sql, &params)?;

        match UpdateState::from_rows(&info.table, res.rows_affected, info.version.is_some())? {
            UpdateState::Confirmed => {
                if let Some(v) = info.version {
                    let bumped = fields[v].get(record).incremented()?;
                    fields[v].set(record, &bumped)?;
                    tracing::trace!(table = %info.table, version = %bumped, "Version confirmed");
                }
            }
            UpdateState::Stale => {
                let version = info
                    .version
                    .and_then(|v| fields[v].get(record).as_i64())
                    .unwrap_or_default();
                tracing::debug!(table = %info.table, version, "Stale update rejected");
                return Err(context::stale(&info.table, table.key_values(record), version));
            }
            UpdateState::Unmatched => {
                tracing::debug!(table = %info.table, "Update matched no row");
                return Ok(false);
            }
        }

        hooks::invoke(Hook::PostUpdate, record, self.exec)?;
        Ok(true)
    }

    /// Delete a record by key. A missing row is `Error::NotFound`.
    pub fn delete<T: Record>(&self, record: &mut T) -> Result<bool> {
        let table = self.registry.get::<T>()?;
        let info = table.info();
        info.require_keys()?;
        let stmt = table
            .statements(self.dialect)
            .delete
            .as_ref()
            .ok_or_else(|| missing_statement(&info.table))?;

        hooks::invoke(Hook::PreDelete, record, self.exec)?;

        let params = bind_params(table.fields(), &stmt.binds, record)?;
        let res = self.ctx.execute(&stmt.sql, &params)?;
        context::confirm_delete(&info.table, table.key_values(record), res.rows_affected)?;

        hooks::invoke(Hook::PostDelete, record, self.exec)?;
        Ok(true)
    }

    /// Load one record by its key values, in key declaration order.
    pub fn get<T: Record>(&self, keys: &[Value]) -> Result<T> {
        let table = self.registry.get::<T>()?;
        let info = table.info();
        info.require_keys()?;
        if keys.len() != info.keys.len() {
            return Err(Error::config(
                ConfigErrorKind::InvalidField,
                format!(
                    "table '{}' has {} key column(s), got {} value(s)",
                    info.table,
                    info.keys.len(),
                    keys.len()
                ),
            ));
        }
        let stmt = table
            .statements(self.dialect)
            .select_by_key
            .as_ref()
            .ok_or_else(|| missing_statement(&info.table))?;

        let rows = self.ctx.query(&stmt.sql, keys)?;
        let row = match rows.as_slice() {
            [] => return Err(context::not_found(&info.table, keys.to_vec())),
            [row] => row,
            many => {
                return Err(context::integrity(
                    &info.table,
                    "SELECT",
                    u64::try_from(many.len()).unwrap_or(u64::MAX),
                ));
            }
        };

        // SELECT lists the mapped columns in field order
        let mapping: Vec<usize> = info.mapped().map(|(i, _)| i).collect();
        let mut record = T::default();
        fill(table.fields(), &mapping, row, &mut record)?;

        hooks::invoke(Hook::PostGet, &mut record, self.exec)?;
        Ok(record)
    }

    /// Run a query and map each row onto a new `T` by column name.
    ///
    /// Columns without a matching field are an error; fields without a
    /// matching column keep their default value.
    pub fn select<T: Record>(&self, sql: &str, params: &[Value]) -> Result<Vec<T>> {
        let table = self.registry.get::<T>()?;
        let rows = self.ctx.query(sql, params)?;
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };

        let info = table.info();
        let mapping = first
            .column_names()
            .map(|name| {
                info.column_index(name).ok_or_else(|| {
                    Error::config(
                        ConfigErrorKind::UnknownField,
                        format!("column '{}' has no field in {}", name, info.type_name),
                    )
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        let fields = table.fields();
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = T::default();
            fill(fields, &mapping, row, &mut record)?;
            hooks::invoke(Hook::PostGet, &mut record, self.exec)?;
            records.push(record);
        }
        Ok(records)
    }

    /// Like `select`, but exactly one row must come back.
    pub fn select_one<T: Record>(&self, sql: &str, params: &[Value]) -> Result<T> {
        let mut records = self.select::<T>(sql, params)?;
        match records.len() {
            1 => Ok(records.remove(0)),
            0 => {
                let table = self.registry.get::<T>()?;
                Err(context::not_found(table.table_name(), params.to_vec()))
            }
            n => {
                let table = self.registry.get::<T>()?;
                Err(context::integrity(
                    table.table_name(),
                    "SELECT",
                    u64::try_from(n).unwrap_or(u64::MAX),
                ))
            }
        }
    }
}

fn fill<T>(fields: &[Field<T>], mapping: &[usize], row: &Row, record: &mut T) -> Result<()> {
    for (pos, &i) in mapping.iter().enumerate() {
        if let Some(value) = row.get(pos) {
            fields[i].set(record, value)?;
        }
    }
    Ok(())
}

/// Resolve a statement's bind sources against a record.
pub(crate) fn bind_params<T>(fields: &[Field<T>], binds: &[Bind], record: &T) -> Result<Vec<Value>> {
    binds
        .iter()
        .map(|bind| match *bind {
            Bind::Field(i) => Ok(fields[i].get(record)),
            Bind::BumpedVersion(i) => fields[i]
                .get(record)
                .incremented()
                .map_err(|e| with_column(e, fields[i].path())),
        })
        .collect()
}

fn missing_statement(table: &str) -> Error {
    Error::config(
        ConfigErrorKind::MissingKey,
        format!("table '{}' has no key", table),
    )
}
