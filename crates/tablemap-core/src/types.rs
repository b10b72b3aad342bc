//! Column types declared by mapped fields.

use std::fmt;

/// Storage type of a mapped field.
///
/// Dialects turn it into concrete DDL; registration uses it to check that
/// keys and version counters are integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    SmallInt,
    Integer,
    BigInt,
    Double,
    Boolean,
    /// Bounded text; `set_max_size` on the field overrides the bound.
    VarChar(u32),
    Text,
    Blob,
    /// JSON document, stored as text where the database has no JSON type.
    Json,
}

impl SqlType {
    /// ANSI spelling, used when a dialect has no override.
    pub fn sql_name(&self) -> String {
        self.to_string()
    }

    pub const fn is_integer(&self) -> bool {
        matches!(self, SqlType::SmallInt | SqlType::Integer | SqlType::BigInt)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Double => "DOUBLE PRECISION",
            SqlType::Boolean => "BOOLEAN",
            SqlType::VarChar(len) => return write!(f, "VARCHAR({})", len),
            SqlType::Text => "TEXT",
            SqlType::Blob => "BLOB",
            SqlType::Json => "JSON",
        };
        f.write_str(name)
    }
}
