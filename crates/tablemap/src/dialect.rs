//! SQL dialects.
//!
//! A [`Dialect`] decides how identifiers are quoted, how bind parameters are
//! written, which column types DDL uses, and how a generated key comes back
//! from an INSERT. Everything else the statement builder emits is portable.

use std::fmt;
use tablemap_core::{SqlType, quote_ident, quote_ident_mysql};

/// Dialect-specific pieces of SQL generation.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Dialect name for logs.
    fn name(&self) -> &'static str;

    /// Quote a table or column name.
    fn quote_ident(&self, name: &str) -> String {
        quote_ident(name)
    }

    /// Bind placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String {
        let _ = index;
        "?".to_string()
    }

    /// Column type used in CREATE TABLE.
    fn column_type(&self, sql_type: SqlType, max_size: Option<u32>) -> String;

    /// Full definition tail for an auto-increment key column, after its name.
    fn auto_increment_column(&self, sql_type: SqlType) -> String;

    /// Whether INSERT reads the generated key back with `RETURNING` instead
    /// of the driver's last insert id.
    fn returns_generated_key(&self) -> bool {
        false
    }

    /// Statement that removes every row from a table.
    fn truncate(&self, quoted_table: &str) -> String {
        format!("TRUNCATE TABLE {}", quoted_table)
    }
}

fn text_type(max_size: Option<u32>) -> String {
    match max_size {
        Some(len) => format!("VARCHAR({})", len),
        None => "TEXT".to_string(),
    }
}

/// SQLite: `?` placeholders, `INTEGER PRIMARY KEY AUTOINCREMENT`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn column_type(&self, sql_type: SqlType, max_size: Option<u32>) -> String {
        match sql_type {
            SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => "INTEGER".to_string(),
            SqlType::Double => "REAL".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::VarChar(len) => format!("VARCHAR({})", max_size.unwrap_or(len)),
            SqlType::Text | SqlType::Json => text_type(max_size),
            SqlType::Blob => "BLOB".to_string(),
        }
    }

    fn auto_increment_column(&self, _sql_type: SqlType) -> String {
        // Only INTEGER PRIMARY KEY aliases the rowid
        "INTEGER PRIMARY KEY AUTOINCREMENT".to_string()
    }

    fn truncate(&self, quoted_table: &str) -> String {
        format!("DELETE FROM {}", quoted_table)
    }
}

/// PostgreSQL: `$n` placeholders, serial keys read back with `RETURNING`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn column_type(&self, sql_type: SqlType, max_size: Option<u32>) -> String {
        match sql_type {
            SqlType::Blob => "BYTEA".to_string(),
            SqlType::Json => "JSONB".to_string(),
            SqlType::Text => text_type(max_size),
            SqlType::VarChar(len) => format!("VARCHAR({})", max_size.unwrap_or(len)),
            other => other.sql_name(),
        }
    }

    fn auto_increment_column(&self, sql_type: SqlType) -> String {
        let serial = match sql_type {
            SqlType::SmallInt => "SMALLSERIAL",
            SqlType::Integer => "SERIAL",
            _ => "BIGSERIAL",
        };
        format!("{} PRIMARY KEY", serial)
    }

    fn returns_generated_key(&self) -> bool {
        true
    }
}

/// MySQL: backtick quoting, `AUTO_INCREMENT` keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_ident_mysql(name)
    }

    fn column_type(&self, sql_type: SqlType, max_size: Option<u32>) -> String {
        match sql_type {
            SqlType::Double => "DOUBLE".to_string(),
            SqlType::Boolean => "TINYINT(1)".to_string(),
            SqlType::VarChar(len) => format!("VARCHAR({})", max_size.unwrap_or(len)),
            SqlType::Text => text_type(max_size),
            other => other.sql_name(),
        }
    }

    fn auto_increment_column(&self, sql_type: SqlType) -> String {
        format!("{} AUTO_INCREMENT PRIMARY KEY", sql_type.sql_name())
    }
}
