//! Result rows and conversion out of [`Value`].

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column names of one result set, shared by all of its rows.
///
/// Lookup by name ignores ASCII case, matching how SQL treats unquoted
/// identifiers. With duplicate names the first column wins.
#[derive(Debug, Clone, Default)]
pub struct Columns {
    names: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl Columns {
    pub fn new(names: Vec<String>) -> Self {
        let mut lookup = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            lookup.entry(name.to_ascii_lowercase()).or_insert(i);
        }
        Self { names, lookup }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// One row of a query result.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<Columns>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        Self::shared(Arc::new(Columns::new(column_names)), values)
    }

    /// Build a row over column names already shared with its siblings.
    pub fn shared(columns: Arc<Columns>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    /// Convert the value at `index`.
    pub fn get_as<T: FromValue>(&self, index: usize) -> Result<T> {
        match self.values.get(index) {
            Some(value) => T::from_value(value),
            None => Err(Error::Type(TypeError {
                expected: std::any::type_name::<T>(),
                actual: format!("no column {} in a row of {}", index, self.len()),
                column: None,
            })),
        }
    }

    /// Convert the value of the named column.
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let Some(index) = self.columns.index_of(name) else {
            return Err(Error::Type(TypeError {
                expected: std::any::type_name::<T>(),
                actual: "missing column".to_string(),
                column: Some(name.to_string()),
            }));
        };
        self.get_as(index).map_err(|e| with_column(e, name))
    }
}

/// Attach a column name to a type error that lacks one.
pub fn with_column(err: Error, column: &str) -> Error {
    match err {
        Error::Type(mut te) if te.column.is_none() => {
            te.column = Some(column.to_string());
            Error::Type(te)
        }
        e => e,
    }
}

/// Conversion from a column value onto a record field.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(expected: &'static str, value: &Value) -> Error {
    Error::Type(TypeError {
        expected,
        actual: value.type_name().to_string(),
        column: None,
    })
}

macro_rules! integer_from_value {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self> {
                    let wide = value
                        .as_i64()
                        .ok_or_else(|| mismatch(stringify!($ty), value))?;
                    <$ty>::try_from(wide).map_err(|_| {
                        Error::Type(TypeError {
                            expected: stringify!($ty),
                            actual: format!("out-of-range integer {}", wide),
                            column: None,
                        })
                    })
                }
            }
        )*
    };
}

integer_from_value!(i16, i32, i64);

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        if let Value::Bool(b) = value {
            return Ok(*b);
        }
        value
            .as_i64()
            .map(|v| v != 0)
            .ok_or_else(|| mismatch("bool", value))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| mismatch("f64", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Json(j) => Ok(j.to_string()),
            other => Err(mismatch("String", other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.clone().into_bytes()),
            other => Err(mismatch("Vec<u8>", other)),
        }
    }
}

/// JSON columns may come back as text (SQLite) or as parsed JSON.
impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            Value::Text(s) => serde_json::from_str(s).map_err(|e| {
                Error::Type(TypeError {
                    expected: "JSON text",
                    actual: e.to_string(),
                    column: None,
                })
            }),
            other => Err(mismatch("JSON", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}
