//! Dynamic SQL values.

use crate::error::{Error, TypeError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A column value crossing the driver boundary.
///
/// Field getters produce one for every bind parameter; field setters consume
/// one for every result column written back onto a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Double(f64),
    Text(String),
    /// Raw bytes (BLOB / BYTEA)
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value holds one of the integer widths.
    pub const fn is_integer(&self) -> bool {
        matches!(self, Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_))
    }

    /// SQL-ish name of the variant, used in type error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::SmallInt(_) => "SMALLINT",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Double(_) => "DOUBLE",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Json(_) => "JSON",
        }
    }

    /// Integer view of any integer width. Booleans read as 0 / 1 since
    /// SQLite stores them that way.
    pub fn as_i64(&self) -> Option<i64> {
        Some(match *self {
            Value::SmallInt(v) => i64::from(v),
            Value::Int(v) => i64::from(v),
            Value::BigInt(v) => v,
            Value::Bool(v) => i64::from(v),
            _ => return None,
        })
    }

    pub fn as_f64(&self) -> Option<f64> {
        Some(match *self {
            Value::Double(v) => v,
            Value::SmallInt(v) => f64::from(v),
            Value::Int(v) => f64::from(v),
            Value::BigInt(v) => v as f64,
            _ => return None,
        })
    }

    /// The next version number: the same integer width, plus one.
    pub fn incremented(&self) -> Result<Value, Error> {
        let next = match *self {
            Value::SmallInt(v) => v.checked_add(1).map(Value::SmallInt),
            Value::Int(v) => v.checked_add(1).map(Value::Int),
            Value::BigInt(v) => v.checked_add(1).map(Value::BigInt),
            _ => {
                return Err(Error::Type(TypeError {
                    expected: "integer",
                    actual: self.type_name().to_string(),
                    column: None,
                }));
            }
        };
        next.ok_or_else(|| {
            Error::Type(TypeError {
                expected: "integer below its type's maximum",
                actual: self.to_string(),
                column: None,
            })
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => v.fmt(f),
            Value::SmallInt(v) => v.fmt(f),
            Value::Int(v) => v.fmt(f),
            Value::BigInt(v) => v.fmt(f),
            Value::Double(v) => v.fmt(f),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Bytes(b) => write!(f, "[BLOB: {} bytes]", b.len()),
            Value::Json(j) => j.fmt(f),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i16 => SmallInt,
    i32 => Int,
    i64 => BigInt,
    f64 => Double,
    String => Text,
    Vec<u8> => Bytes,
    serde_json::Value => Json,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

/// `None` binds as NULL.
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incremented_keeps_width() {
        assert_eq!(Value::Int(4).incremented().unwrap(), Value::Int(5));
        assert_eq!(Value::BigInt(9).incremented().unwrap(), Value::BigInt(10));
        assert_eq!(Value::SmallInt(0).incremented().unwrap(), Value::SmallInt(1));
    }

    #[test]
    fn test_incremented_rejects_overflow_and_non_integers() {
        assert!(Value::Int(i32::MAX).incremented().is_err());
        assert!(Value::Text("1".into()).incremented().is_err());
        assert!(Value::Null.incremented().is_err());
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(Some(3_i32)), Value::Int(3));
        assert_eq!(Value::from(None::<String>), Value::Null);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Text("socks".into()).to_string(), "'socks'");
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Bytes(vec![1, 2]).to_string(), "[BLOB: 2 bytes]");
    }

    #[test]
    fn test_integer_views() {
        assert!(Value::SmallInt(1).is_integer());
        assert!(!Value::Double(1.0).is_integer());
        assert_eq!(Value::Bool(true).as_i64(), Some(1));
        assert_eq!(Value::BigInt(3).as_f64(), Some(3.0));
    }

    #[test]
    fn test_as_i64_widens() {
        assert_eq!(Value::SmallInt(-2).as_i64(), Some(-2));
        assert_eq!(Value::Int(7).as_i64(), Some(7));
        assert_eq!(Value::Text("7".into()).as_i64(), None);
    }
}
