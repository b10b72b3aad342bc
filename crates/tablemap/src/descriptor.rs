//! Type descriptors and the table registry.
//!
//! Registering a record type produces a [`TableMap`]: the table name, one
//! [`ColumnDef`] per field, the key columns, and the optional version
//! column. Descriptors are refined through a [`TableHandle`] right after
//! registration and are read-only once the mapper starts running statements.

use crate::dialect::Dialect;
use crate::record::{Field, Record};
use crate::statement::{self, Statement};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::OnceLock;
use tablemap_core::{
    ConfigErrorKind, Error, Result, SqlType, Value, default_column_name, is_valid_identifier,
};

/// Mapping metadata for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Dotted field path within the record
    pub field: String,
    /// Database column name
    pub name: String,
    pub sql_type: SqlType,
    pub is_key: bool,
    pub is_version: bool,
    pub is_auto_increment: bool,
    /// Excluded from every generated statement
    pub transient: bool,
    /// Length for VARCHAR columns in DDL
    pub max_size: Option<u32>,
    pub unique: bool,
    pub not_null: bool,
}

impl ColumnDef {
    fn new(field: &str, sql_type: SqlType) -> Self {
        Self {
            field: field.to_string(),
            name: default_column_name(field),
            sql_type,
            is_key: false,
            is_version: false,
            is_auto_increment: false,
            transient: false,
            max_size: None,
            unique: false,
            not_null: false,
        }
    }
}

/// Type-independent description of a mapped table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub type_name: &'static str,
    pub table: String,
    pub columns: Vec<ColumnDef>,
    /// Indexes of key columns, in the order they were declared.
    pub keys: Vec<usize>,
    pub version: Option<usize>,
}

impl TableInfo {
    /// Whether the single key is generated by the database.
    pub fn auto_increment(&self) -> bool {
        self.keys
            .iter()
            .any(|&i| self.columns[i].is_auto_increment)
    }

    pub fn key_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.keys.iter().map(|&i| &self.columns[i])
    }

    pub fn version_column(&self) -> Option<&ColumnDef> {
        self.version.map(|i| &self.columns[i])
    }

    /// Columns that take part in generated SQL.
    pub fn mapped(&self) -> impl Iterator<Item = (usize, &ColumnDef)> {
        self.columns.iter().enumerate().filter(|(_, c)| !c.transient)
    }

    /// Index of the mapped column named `name` (ASCII case-insensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.mapped()
            .find(|(_, c)| c.name.eq_ignore_ascii_case(name))
            .map(|(i, _)| i)
    }

    fn field_index(&self, path: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.field == path)
            .ok_or_else(|| {
                Error::config(
                    ConfigErrorKind::UnknownField,
                    format!("{} has no field '{}'", self.type_name, path),
                )
            })
    }

    pub(crate) fn require_keys(&self) -> Result<()> {
        if self.keys.is_empty() {
            return Err(Error::config(
                ConfigErrorKind::MissingKey,
                format!(
                    "table '{}' has no key; call set_keys when registering {}",
                    self.table, self.type_name
                ),
            ));
        }
        Ok(())
    }
}

/// Statements generated once per table and reused for every call.
#[derive(Debug, Clone)]
pub(crate) struct Statements {
    pub insert: Statement,
    /// `None` without keys or without a column to SET
    pub update: Option<Statement>,
    /// `None` without keys
    pub delete: Option<Statement>,
    pub select_by_key: Option<Statement>,
}

/// Registered descriptor of a record type `T`.
pub struct TableMap<T> {
    info: TableInfo,
    fields: Vec<Field<T>>,
    statements: OnceLock<Statements>,
}

impl<T: Record> TableMap<T> {
    fn new(table: &str) -> Result<Self> {
        let type_name = std::any::type_name::<T>();
        let fields = T::fields();
        if fields.is_empty() {
            return Err(Error::config(
                ConfigErrorKind::NoFields,
                format!("{} declares no fields", type_name),
            ));
        }
        check_identifier(table, "table")?;

        let mut columns: Vec<ColumnDef> = Vec::with_capacity(fields.len());
        for field in &fields {
            let column = ColumnDef::new(field.path(), field.sql_type());
            check_identifier(&column.name, "column")?;
            if columns.iter().any(|c| c.field == column.field) {
                return Err(Error::config(
                    ConfigErrorKind::InvalidField,
                    format!("{} declares field '{}' twice", type_name, column.field),
                ));
            }
            columns.push(column);
        }

        let info = TableInfo {
            type_name,
            table: table.to_string(),
            columns,
            keys: Vec::new(),
            version: None,
        };
        check_unique_columns(&info)?;

        Ok(Self {
            info,
            fields,
            statements: OnceLock::new(),
        })
    }
}

impl<T> TableMap<T> {
    pub fn info(&self) -> &TableInfo {
        &self.info
    }

    pub fn table_name(&self) -> &str {
        &self.info.table
    }

    pub(crate) fn fields(&self) -> &[Field<T>] {
        &self.fields
    }

    /// Current values of the key columns.
    pub(crate) fn key_values(&self, record: &T) -> Vec<Value> {
        self.info
            .keys
            .iter()
            .map(|&i| self.fields[i].get(record))
            .collect()
    }

    pub(crate) fn statements(&self, dialect: &dyn Dialect) -> &Statements {
        self.statements.get_or_init(|| {
            tracing::debug!(
                table = %self.info.table,
                dialect = dialect.name(),
                "Building statements"
            );
            Statements {
                insert: statement::build_insert(&self.info, dialect),
                update: statement::build_update(&self.info, dialect),
                delete: statement::build_delete(&self.info, dialect),
                select_by_key: statement::build_select_by_key(&self.info, dialect),
            }
        })
    }

    fn invalidate(&mut self) {
        self.statements = OnceLock::new();
    }
}

impl<T> std::fmt::Debug for TableMap<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableMap")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

fn check_identifier(name: &str, what: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::config(
            ConfigErrorKind::InvalidIdentifier,
            format!("'{}' is not a valid {} name", name, what),
        ))
    }
}

fn check_unique_columns(info: &TableInfo) -> Result<()> {
    for (i, column) in info.mapped() {
        if info
            .mapped()
            .any(|(j, other)| j != i && other.name.eq_ignore_ascii_case(&column.name))
        {
            return Err(Error::config(
                ConfigErrorKind::InvalidField,
                format!(
                    "{} maps more than one field to column '{}'",
                    info.type_name, column.name
                ),
            ));
        }
    }
    Ok(())
}

/// Registration-time access to one table's descriptor.
///
/// Returned by [`Mapper::add_table`](crate::Mapper::add_table). Every setter
/// validates its input and can be chained:
///
/// ```rust,ignore
/// mapper
///     .add_table_with_name::<Product>("products")?
///     .set_keys(true, &["id"])?
///     .set_version_col("version")?;
/// ```
pub struct TableHandle<'a, T> {
    table: &'a mut TableMap<T>,
}

impl<T> std::fmt::Debug for TableHandle<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableHandle")
            .field("table", &self.table)
            .finish()
    }
}

impl<'a, T> TableHandle<'a, T> {
    pub(crate) fn new(table: &'a mut TableMap<T>) -> Self {
        Self { table }
    }

    pub fn info(&self) -> &TableInfo {
        &self.table.info
    }

    /// Declare the key fields, replacing any earlier declaration.
    ///
    /// With `auto_increment` the database generates the key, so exactly one
    /// integer key field is allowed.
    pub fn set_keys(&mut self, auto_increment: bool, fields: &[&str]) -> Result<&mut Self> {
        let info = &self.table.info;
        if fields.is_empty() {
            return Err(Error::config(
                ConfigErrorKind::MissingKey,
                format!("{}: set_keys needs at least one field", info.type_name),
            ));
        }

        let mut keys = Vec::with_capacity(fields.len());
        for path in fields {
            let index = info.field_index(path)?;
            let column = &info.columns[index];
            if keys.contains(&index) {
                return Err(invalid(info, path, "is listed twice as a key"));
            }
            if column.is_version {
                return Err(invalid(info, path, "is the version field and cannot be a key"));
            }
            if column.transient {
                return Err(invalid(info, path, "is transient and cannot be a key"));
            }
            keys.push(index);
        }

        if auto_increment {
            if keys.len() != 1 {
                return Err(Error::config(
                    ConfigErrorKind::InvalidField,
                    format!(
                        "{}: an auto-increment key must be a single field, got {}",
                        info.type_name,
                        keys.len()
                    ),
                ));
            }
            if !info.columns[keys[0]].sql_type.is_integer() {
                return Err(invalid(info, fields[0], "must be an integer to auto-increment"));
            }
        }

        let info = &mut self.table.info;
        for column in &mut info.columns {
            column.is_key = false;
            column.is_auto_increment = false;
        }
        for &i in &keys {
            info.columns[i].is_key = true;
            info.columns[i].is_auto_increment = auto_increment;
        }
        info.keys = keys;
        self.table.invalidate();
        Ok(self)
    }

    /// Use an integer field as the optimistic-lock version counter.
    pub fn set_version_col(&mut self, field: &str) -> Result<&mut Self> {
        let info = &self.table.info;
        let index = info.field_index(field)?;
        let column = &info.columns[index];
        if !column.sql_type.is_integer() {
            return Err(invalid(info, field, "must be an integer to serve as version"));
        }
        if column.is_key {
            return Err(invalid(info, field, "is a key and cannot be the version"));
        }
        if column.transient {
            return Err(invalid(info, field, "is transient and cannot be the version"));
        }

        let info = &mut self.table.info;
        for column in &mut info.columns {
            column.is_version = false;
        }
        info.columns[index].is_version = true;
        info.version = Some(index);
        self.table.invalidate();
        Ok(self)
    }

    /// Override the column name of a field.
    pub fn set_column_name(&mut self, field: &str, column: &str) -> Result<&mut Self> {
        check_identifier(column, "column")?;
        let index = self.table.info.field_index(field)?;
        let previous = std::mem::replace(
            &mut self.table.info.columns[index].name,
            column.to_string(),
        );
        if let Err(e) = check_unique_columns(&self.table.info) {
            self.table.info.columns[index].name = previous;
            return Err(e);
        }
        self.table.invalidate();
        Ok(self)
    }

    /// Keep a field out of every generated statement.
    pub fn set_transient(&mut self, field: &str, transient: bool) -> Result<&mut Self> {
        let info = &self.table.info;
        let index = info.field_index(field)?;
        let column = &info.columns[index];
        if transient && (column.is_key || column.is_version) {
            return Err(invalid(info, field, "is a key or version and cannot be transient"));
        }
        self.table.info.columns[index].transient = transient;
        if !transient {
            check_unique_columns(&self.table.info).inspect_err(|_| {
                self.table.info.columns[index].transient = true;
            })?;
        }
        self.table.invalidate();
        Ok(self)
    }

    /// Maximum length of a text column, used by DDL.
    pub fn set_max_size(&mut self, field: &str, size: u32) -> Result<&mut Self> {
        let index = self.table.info.field_index(field)?;
        self.table.info.columns[index].max_size = Some(size);
        Ok(self)
    }

    pub fn set_unique(&mut self, field: &str, unique: bool) -> Result<&mut Self> {
        let index = self.table.info.field_index(field)?;
        self.table.info.columns[index].unique = unique;
        Ok(self)
    }

    pub fn set_not_null(&mut self, field: &str, not_null: bool) -> Result<&mut Self> {
        let index = self.table.info.field_index(field)?;
        self.table.info.columns[index].not_null = not_null;
        Ok(self)
    }
}

fn invalid(info: &TableInfo, field: &str, reason: &str) -> Error {
    Error::config(
        ConfigErrorKind::InvalidField,
        format!("{}: field '{}' {}", info.type_name, field, reason),
    )
}

/// Descriptor stored without its record type.
trait ErasedTable: Send + Sync {
    fn info(&self) -> &TableInfo;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Record> ErasedTable for TableMap<T> {
    fn info(&self) -> &TableInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// All registered descriptors, in registration order.
#[derive(Default)]
pub(crate) struct Registry {
    tables: Vec<Box<dyn ErasedTable>>,
    by_type: HashMap<TypeId, usize>,
}

impl Registry {
    pub fn register<T: Record>(&mut self, table: &str) -> Result<&mut TableMap<T>> {
        let type_name = std::any::type_name::<T>();
        if self.by_type.contains_key(&TypeId::of::<T>()) {
            return Err(Error::config(
                ConfigErrorKind::DuplicateTable,
                format!("{} is already registered", type_name),
            ));
        }
        if let Some(existing) = self
            .tables
            .iter()
            .find(|t| t.info().table.eq_ignore_ascii_case(table))
        {
            return Err(Error::config(
                ConfigErrorKind::DuplicateTable,
                format!(
                    "table '{}' is already mapped to {}",
                    table,
                    existing.info().type_name
                ),
            ));
        }

        let map = TableMap::<T>::new(table)?;
        tracing::debug!(
            record = type_name,
            table = %table,
            columns = map.info.columns.len(),
            "Registered table"
        );

        let index = self.tables.len();
        self.tables.push(Box::new(map));
        self.by_type.insert(TypeId::of::<T>(), index);
        self.tables[index]
            .as_any_mut()
            .downcast_mut::<TableMap<T>>()
            .ok_or_else(unregistered::<T>)
    }

    pub fn get<T: Record>(&self) -> Result<&TableMap<T>> {
        self.by_type
            .get(&TypeId::of::<T>())
            .and_then(|&i| self.tables[i].as_any().downcast_ref::<TableMap<T>>())
            .ok_or_else(unregistered::<T>)
    }

    pub fn infos(&self) -> impl DoubleEndedIterator<Item = &TableInfo> {
        self.tables.iter().map(|t| t.info())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }
}

fn unregistered<T>() -> Error {
    Error::config(
        ConfigErrorKind::UnregisteredType,
        format!("{} is not registered", std::any::type_name::<T>()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field;

    #[derive(Debug, Default)]
    struct Product {
        id: i64,
        description: String,
        unit_price: i32,
        version: i32,
    }

    impl Record for Product {
        fn fields() -> Vec<Field<Self>> {
            vec![
                field!(Product, id, SqlType::BigInt),
                field!(Product, description, SqlType::Text),
                field!(Product, unit_price, SqlType::Integer),
                field!(Product, version, SqlType::Integer),
            ]
        }
    }

    #[derive(Debug, Default)]
    struct Empty;

    impl Record for Empty {
        fn fields() -> Vec<Field<Self>> {
            Vec::new()
        }
    }

    fn kind(err: &Error) -> ConfigErrorKind {
        match err {
            Error::Config(c) => c.kind,
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_register_defaults() {
        let mut registry = Registry::default();
        let map = registry.register::<Product>("Product").unwrap();
        let names: Vec<&str> = map.info().columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "description", "unit_price", "version"]);
        assert!(map.info().keys.is_empty());
        assert!(map.info().version.is_none());
    }

    #[test]
    fn test_register_twice_rejected() {
        let mut registry = Registry::default();
        registry.register::<Product>("products").unwrap();
        let err = registry.register::<Product>("other").unwrap_err();
        assert_eq!(kind(&err), ConfigErrorKind::DuplicateTable);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_no_fields_rejected() {
        let mut registry = Registry::default();
        let err = registry.register::<Empty>("empty").unwrap_err();
        assert_eq!(kind(&err), ConfigErrorKind::NoFields);
    }

    #[test]
    fn test_invalid_table_name_rejected() {
        let mut registry = Registry::default();
        let err = registry.register::<Product>("drop table;").unwrap_err();
        assert_eq!(kind(&err), ConfigErrorKind::InvalidIdentifier);
    }

    #[test]
    fn test_unregistered_lookup() {
        let registry = Registry::default();
        let err = registry.get::<Product>().unwrap_err();
        assert_eq!(kind(&err), ConfigErrorKind::UnregisteredType);
    }

    #[test]
    fn test_set_keys_and_version() {
        let mut registry = Registry::default();
        let map = registry.register::<Product>("products").unwrap();
        TableHandle::new(map)
            .set_keys(true, &["id"])
            .unwrap()
            .set_version_col("version")
            .unwrap();

        let info = registry.get::<Product>().unwrap().info();
        assert_eq!(info.keys, [0]);
        assert!(info.auto_increment());
        assert_eq!(info.version, Some(3));
        assert_eq!(info.version_column().unwrap().name, "version");
    }

    #[test]
    fn test_unknown_key_field() {
        let mut registry = Registry::default();
        let mut handle = TableHandle::new(registry.register::<Product>("products").unwrap());
        let err = handle.set_keys(false, &["sku"]).err().unwrap();
        assert_eq!(kind(&err), ConfigErrorKind::UnknownField);
    }

    #[test]
    fn test_auto_increment_rules() {
        let mut registry = Registry::default();
        let mut handle = TableHandle::new(registry.register::<Product>("products").unwrap());
        let err = handle.set_keys(true, &["id", "unit_price"]).err().unwrap();
        assert_eq!(kind(&err), ConfigErrorKind::InvalidField);
        let err = handle.set_keys(true, &["description"]).err().unwrap();
        assert_eq!(kind(&err), ConfigErrorKind::InvalidField);
        assert!(handle.set_keys(false, &["id", "unit_price"]).is_ok());
        assert!(!handle.info().auto_increment());
    }

    #[test]
    fn test_version_field_rules() {
        let mut registry = Registry::default();
        let mut handle = TableHandle::new(registry.register::<Product>("products").unwrap());
        handle.set_keys(true, &["id"]).unwrap();

        let err = handle.set_version_col("description").err().unwrap();
        assert_eq!(kind(&err), ConfigErrorKind::InvalidField);
        let err = handle.set_version_col("id").err().unwrap();
        assert_eq!(kind(&err), ConfigErrorKind::InvalidField);

        handle.set_version_col("version").unwrap();
        let err = handle.set_keys(false, &["version"]).err().unwrap();
        assert_eq!(kind(&err), ConfigErrorKind::InvalidField);
    }

    #[test]
    fn test_set_column_name() {
        let mut registry = Registry::default();
        let mut handle = TableHandle::new(registry.register::<Product>("products").unwrap());
        handle.set_column_name("unit_price", "price").unwrap();
        assert_eq!(handle.info().columns[2].name, "price");

        let err = handle.set_column_name("description", "PRICE").err().unwrap();
        assert_eq!(kind(&err), ConfigErrorKind::InvalidField);
        assert_eq!(handle.info().columns[1].name, "description");

        let err = handle.set_column_name("description", "bad name").err().unwrap();
        assert_eq!(kind(&err), ConfigErrorKind::InvalidIdentifier);
    }

    #[test]
    fn test_transient_excluded_from_mapped() {
        let mut registry = Registry::default();
        let mut handle = TableHandle::new(registry.register::<Product>("products").unwrap());
        handle.set_transient("unit_price", true).unwrap();
        assert!(handle.info().column_index("unit_price").is_none());
        assert_eq!(handle.info().column_index("DESCRIPTION"), Some(1));

        handle.set_keys(false, &["id"]).unwrap();
        let err = handle.set_transient("id", true).err().unwrap();
        assert_eq!(kind(&err), ConfigErrorKind::InvalidField);
    }

    #[test]
    fn test_missing_key_reported() {
        let mut registry = Registry::default();
        registry.register::<Product>("products").unwrap();
        let err = registry.get::<Product>().unwrap().info().require_keys().unwrap_err();
        assert_eq!(kind(&err), ConfigErrorKind::MissingKey);
    }
}
