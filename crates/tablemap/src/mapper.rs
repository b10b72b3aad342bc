//! The mapper: table registry plus CRUD on the ambient connection.
//!
//! # Example
//!
//! ```rust,ignore
//! use tablemap::{Mapper, Value};
//! use tablemap_sqlite::SqliteConnection;
//!
//! let mut mapper = Mapper::new(SqliteConnection::open_memory()?);
//! mapper
//!     .add_table_with_name::<Product>("products")?
//!     .set_keys(true, &["id"])?
//!     .set_version_col("version")?;
//! mapper.create_tables()?;
//!
//! let mut p = Product { description: "Wool socks".into(), unit_price: 450, ..Default::default() };
//! mapper.insert_one(&mut p)?;
//! assert_eq!(p.version, 1);
//!
//! let loaded: Product = mapper.get(&[Value::from(p.id)])?;
//! ```

use crate::context::ExecutionContext;
use crate::ddl;
use crate::descriptor::{Registry, TableHandle, TableInfo, TableMap};
use crate::dialect::{Dialect, SqliteDialect};
use crate::executor::SqlExecutor;
use crate::ops::Ops;
use crate::record::Record;
use crate::trace::TraceSink;
use crate::transaction::Transaction;
use std::marker::PhantomData;
use std::sync::Arc;
use tablemap_core::{Connection, ExecResult, Result, Row, Value};

/// Maps registered record types onto tables of one connection.
///
/// Register every type first (`add_table*` needs `&mut self`), then share
/// the mapper by reference: all operations take `&self`.
pub struct Mapper<C: Connection> {
    conn: C,
    dialect: Box<dyn Dialect>,
    registry: Registry,
    trace: Option<Arc<dyn TraceSink>>,
}

impl<C: Connection> Mapper<C> {
    /// Create a mapper using the SQLite dialect and no tracing.
    pub fn new(conn: C) -> Self {
        MapperBuilder::new().build(conn)
    }

    /// Create a mapper builder.
    #[must_use]
    pub fn builder() -> MapperBuilder<C> {
        MapperBuilder::new()
    }

    /// Get a reference to the underlying connection.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Consume the mapper and return the underlying connection.
    pub fn into_connection(self) -> C {
        self.conn
    }

    pub fn dialect(&self) -> &dyn Dialect {
        &*self.dialect
    }

    /// Register `T` under its type name (`my_app::Product` → `Product`).
    ///
    /// Generic arguments are dropped, so `Page<my_app::Product>` registers
    /// as `Page`; two instantiations of one generic type need
    /// [`add_table_with_name`](Self::add_table_with_name).
    pub fn add_table<T: Record>(&mut self) -> Result<TableHandle<'_, T>> {
        let name = default_table_name(std::any::type_name::<T>());
        self.add_table_with_name::<T>(name)
    }

    /// Register `T` under an explicit table name.
    pub fn add_table_with_name<T: Record>(&mut self, table: &str) -> Result<TableHandle<'_, T>> {
        let map = self.registry.register::<T>(table)?;
        Ok(TableHandle::new(map))
    }

    /// The descriptor registered for `T`.
    pub fn table<T: Record>(&self) -> Result<&TableMap<T>> {
        self.registry.get::<T>()
    }

    /// Descriptors of all registered tables, in registration order.
    pub fn tables(&self) -> impl Iterator<Item = &TableInfo> {
        self.registry.infos()
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn trace(&self) -> Option<&dyn TraceSink> {
        self.trace.as_deref()
    }

    fn context(&self) -> ExecutionContext<'_> {
        ExecutionContext::new(&self.conn, false, self.trace())
    }

    fn ops(&self) -> Ops<'_> {
        Ops {
            registry: &self.registry,
            dialect: &*self.dialect,
            ctx: self.context(),
            exec: self,
        }
    }

    /// Insert records in order, each in its own statement.
    ///
    /// On failure the remaining records are skipped; records already
    /// inserted stay committed. With more than one record the error is an
    /// `Error::Batch` naming the failing index.
    #[tracing::instrument(level = "debug", skip(self, records), fields(record = std::any::type_name::<T>(), count = records.len()))]
    pub fn insert<T: Record>(&self, records: &mut [T]) -> Result<()> {
        self.ops().insert(records)
    }

    /// Insert a single record.
    pub fn insert_one<T: Record>(&self, record: &mut T) -> Result<()> {
        self.insert(std::slice::from_mut(record))
    }

    /// Update a record by key, checking and bumping its version if it has one.
    ///
    /// Returns `Ok(false)` when an unversioned record matched no row; a
    /// versioned record that matched no row is `Error::OptimisticLock`.
    #[tracing::instrument(level = "debug", skip(self, record), fields(record = std::any::type_name::<T>()))]
    pub fn update<T: Record>(&self, record: &mut T) -> Result<bool> {
        self.ops().update(record)
    }

    /// Delete a record by key. A missing row is `Error::NotFound`.
    #[tracing::instrument(level = "debug", skip(self, record), fields(record = std::any::type_name::<T>()))]
    pub fn delete<T: Record>(&self, record: &mut T) -> Result<bool> {
        self.ops().delete(record)
    }

    /// Load a record by its key values. A missing row is `Error::NotFound`.
    #[tracing::instrument(level = "debug", skip(self, keys), fields(record = std::any::type_name::<T>()))]
    pub fn get<T: Record>(&self, keys: &[Value]) -> Result<T> {
        self.ops().get(keys)
    }

    /// Run a query and map each row onto a `T` by column name.
    pub fn select<T: Record>(&self, sql: &str, params: &[Value]) -> Result<Vec<T>> {
        self.ops().select(sql, params)
    }

    /// Run a query that must return exactly one `T`.
    pub fn select_one<T: Record>(&self, sql: &str, params: &[Value]) -> Result<T> {
        self.ops().select_one(sql, params)
    }

    /// Begin a transaction on the underlying connection.
    ///
    /// The transaction holds the mapper's only connection. Until it ends,
    /// operations called on the mapper itself (from this or another thread)
    /// run inside it and commit or roll back with it.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn begin(&self) -> Result<Transaction<'_, C>> {
        let tx = self.conn.begin()?;
        tracing::debug!("Transaction started");
        Ok(Transaction::new(self, tx))
    }

    /// CREATE TABLE for every registered table.
    pub fn create_tables(&self) -> Result<()> {
        self.run_ddl(|info, d| ddl::create_table(info, d, false), false)
    }

    pub fn create_tables_if_not_exists(&self) -> Result<()> {
        self.run_ddl(|info, d| ddl::create_table(info, d, true), false)
    }

    /// DROP TABLE for every registered table, last registered first.
    pub fn drop_tables(&self) -> Result<()> {
        self.run_ddl(|info, d| ddl::drop_table(info, d, false), true)
    }

    pub fn drop_tables_if_exists(&self) -> Result<()> {
        self.run_ddl(|info, d| ddl::drop_table(info, d, true), true)
    }

    /// Remove every row from every registered table.
    pub fn truncate_tables(&self) -> Result<()> {
        self.run_ddl(ddl::truncate_table, true)
    }

    fn run_ddl(
        &self,
        build: impl Fn(&TableInfo, &dyn Dialect) -> String,
        reverse: bool,
    ) -> Result<()> {
        let statements: Vec<String> = if reverse {
            self.registry
                .infos()
                .rev()
                .map(|info| build(info, self.dialect()))
                .collect()
        } else {
            self.registry
                .infos()
                .map(|info| build(info, self.dialect()))
                .collect()
        };

        let ctx = self.context();
        for sql in &statements {
            tracing::debug!(sql = %sql, "Executing DDL");
            ctx.execute(sql, &[])?;
        }
        Ok(())
    }
}

impl<C: Connection> SqlExecutor for Mapper<C> {
    fn exec(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        self.context().execute(sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.context().query(sql, params)
    }
}

impl<C: Connection> std::fmt::Debug for Mapper<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("dialect", &self.dialect)
            .field("tables", &self.registry.len())
            .field("trace", &self.trace.is_some())
            .finish_non_exhaustive()
    }
}

/// Last path segment of a type name, without generic arguments.
fn default_table_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

/// Builder for creating Mapper instances with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// let mapper = Mapper::builder()
///     .dialect(PostgresDialect)
///     .trace(TracingSink)
///     .build(connection);
/// ```
pub struct MapperBuilder<C> {
    dialect: Option<Box<dyn Dialect>>,
    trace: Option<Arc<dyn TraceSink>>,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Connection> MapperBuilder<C> {
    pub fn new() -> Self {
        Self {
            dialect: None,
            trace: None,
            _marker: PhantomData,
        }
    }

    /// SQL dialect for generated statements (default: SQLite).
    pub fn dialect(mut self, dialect: impl Dialect + 'static) -> Self {
        self.dialect = Some(Box::new(dialect));
        self
    }

    /// Send every executed statement to `sink`.
    pub fn trace(mut self, sink: impl TraceSink + 'static) -> Self {
        self.trace = Some(Arc::new(sink));
        self
    }

    /// Share a sink the caller keeps a handle to.
    pub fn trace_shared(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(sink);
        self
    }

    /// Build the mapper over `conn`.
    pub fn build(self, conn: C) -> Mapper<C> {
        let dialect = self.dialect.unwrap_or_else(|| Box::new(SqliteDialect));
        tracing::debug!(dialect = dialect.name(), trace = self.trace.is_some(), "Mapper created");
        Mapper {
            conn,
            dialect,
            registry: Registry::default(),
            trace: self.trace,
        }
    }
}

impl<C: Connection> Default for MapperBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for MapperBuilder<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapperBuilder")
            .field("dialect", &self.dialect)
            .field("trace", &self.trace.is_some())
            .finish_non_exhaustive()
    }
}
