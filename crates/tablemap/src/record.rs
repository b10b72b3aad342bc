//! Record types and their field accessors.
//!
//! A record type lists its persistent fields once, as [`Field`] values that
//! pair a name and SQL type with a getter and a setter. The mapper never
//! inspects a record any other way.
//!
//! # Example
//!
//! ```rust,ignore
//! use tablemap::{Field, Record, SqlType, field};
//!
//! #[derive(Debug, Default)]
//! struct Product {
//!     id: i64,
//!     description: String,
//!     unit_price: i32,
//!     version: i32,
//! }
//!
//! impl Record for Product {
//!     fn fields() -> Vec<Field<Self>> {
//!         vec![
//!             field!(Product, id, SqlType::BigInt),
//!             field!(Product, description, SqlType::Text),
//!             field!(Product, unit_price, SqlType::Integer),
//!             field!(Product, version, SqlType::Integer),
//!         ]
//!     }
//! }
//! ```

use crate::hooks::Hooks;
use std::fmt;
use std::sync::Arc;
use tablemap_core::{Error, FromValue, Result, SqlType, Value, row::with_column};

type Getter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;
type Setter<T> = Arc<dyn Fn(&mut T, &Value) -> Result<()> + Send + Sync>;

/// A type whose instances map onto rows of one table.
pub trait Record: Default + Send + 'static {
    /// The persistent fields, in column order.
    fn fields() -> Vec<Field<Self>>;

    /// Lifecycle hooks for this record.
    ///
    /// Types opt in by implementing [`Hooks`] and returning `Some(self)`.
    fn hooks(&mut self) -> Option<&mut dyn Hooks> {
        None
    }
}

/// One persistent field of a record type.
pub struct Field<T> {
    path: String,
    sql_type: SqlType,
    get: Getter<T>,
    set: Setter<T>,
}

impl<T: 'static> Field<T> {
    /// Describe a field through a pair of projections onto it.
    pub fn new<V>(
        name: &str,
        sql_type: SqlType,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Self
    where
        V: Clone + Into<Value> + FromValue + 'static,
    {
        let column = name.to_string();
        Self {
            path: name.to_string(),
            sql_type,
            get: Arc::new(move |record: &T| get(record).clone().into()),
            set: Arc::new(move |record: &mut T, value: &Value| -> Result<()> {
                *get_mut(record) = V::from_value(value).map_err(|e| with_column(e, &column))?;
                Ok(())
            }),
        }
    }

    /// Describe a field through arbitrary conversion closures.
    ///
    /// Use this when the stored representation differs from the Rust one.
    pub fn computed(
        name: &str,
        sql_type: SqlType,
        get: impl Fn(&T) -> Value + Send + Sync + 'static,
        set: impl Fn(&mut T, &Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            path: name.to_string(),
            sql_type,
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    /// Lift the fields of an embedded struct onto the outer record.
    ///
    /// Each field's path gains `prefix.` so `audit.version` stays distinct
    /// from an outer `version`. Conversion errors name the prefixed path.
    pub fn embed<U: 'static>(
        prefix: &str,
        project: fn(&T) -> &U,
        project_mut: fn(&mut T) -> &mut U,
        fields: Vec<Field<U>>,
    ) -> Vec<Self> {
        fields
            .into_iter()
            .map(|inner| {
                let Field {
                    path,
                    sql_type,
                    get,
                    set,
                } = inner;
                let full = format!("{}.{}", prefix, path);
                let column = full.clone();
                Self {
                    path: full,
                    sql_type,
                    get: Arc::new(move |record: &T| get(project(record))),
                    set: Arc::new(move |record: &mut T, value: &Value| {
                        set(project_mut(record), value).map_err(|e| match e {
                            Error::Type(mut te)
                                if te.column.as_deref().is_none_or(|c| c == path) =>
                            {
                                te.column = Some(column.clone());
                                Error::Type(te)
                            }
                            e => e,
                        })
                    }),
                }
            })
            .collect()
    }
}

impl<T> Field<T> {
    /// Dotted path of the field within the record (`audit.version`).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last segment of the path.
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    /// Read the field's current value.
    pub fn get(&self, record: &T) -> Value {
        (self.get)(record)
    }

    /// Write a value into the field.
    pub fn set(&self, record: &mut T, value: &Value) -> Result<()> {
        (self.set)(record, value)
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            sql_type: self.sql_type,
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("path", &self.path)
            .field("sql_type", &self.sql_type)
            .finish_non_exhaustive()
    }
}

/// Build a [`Field`] for a plain struct member.
///
/// `field!(Product, unit_price, SqlType::Integer)` expands to a `Field::new`
/// call with projections onto `unit_price`.
#[macro_export]
macro_rules! field {
    ($ty:ty, $name:ident, $sql_type:expr) => {
        $crate::Field::<$ty>::new(
            stringify!($name),
            $sql_type,
            |r: &$ty| &r.$name,
            |r: &mut $ty| &mut r.$name,
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Audit {
        version: i32,
        note: Option<String>,
    }

    impl Record for Audit {
        fn fields() -> Vec<Field<Self>> {
            vec![
                crate::field!(Audit, version, SqlType::Integer),
                crate::field!(Audit, note, SqlType::Text),
            ]
        }
    }

    #[derive(Debug, Default)]
    struct Invoice {
        id: i64,
        total: f64,
        audit: Audit,
    }

    impl Record for Invoice {
        fn fields() -> Vec<Field<Self>> {
            let mut fields = vec![
                crate::field!(Invoice, id, SqlType::BigInt),
                crate::field!(Invoice, total, SqlType::Double),
            ];
            fields.extend(Field::embed(
                "audit",
                |i: &Invoice| &i.audit,
                |i: &mut Invoice| &mut i.audit,
                Audit::fields(),
            ));
            fields
        }
    }

    #[test]
    fn test_get_and_set() {
        let fields = Invoice::fields();
        let mut invoice = Invoice {
            id: 7,
            total: 12.5,
            ..Default::default()
        };

        assert_eq!(fields[0].get(&invoice), Value::BigInt(7));
        fields[1].set(&mut invoice, &Value::Double(3.0)).unwrap();
        assert!((invoice.total - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_embedded_paths() {
        let fields = Invoice::fields();
        let paths: Vec<&str> = fields.iter().map(Field::path).collect();
        assert_eq!(paths, ["id", "total", "audit.version", "audit.note"]);
        assert_eq!(fields[2].name(), "version");
    }

    #[test]
    fn test_embedded_accessors_reach_inner_struct() {
        let fields = Invoice::fields();
        let mut invoice = Invoice::default();
        fields[2].set(&mut invoice, &Value::BigInt(4)).unwrap();
        fields[3].set(&mut invoice, &Value::Text("ok".into())).unwrap();
        assert_eq!(invoice.audit.version, 4);
        assert_eq!(invoice.audit.note.as_deref(), Some("ok"));
        assert_eq!(fields[3].get(&Invoice::default()), Value::Null);
    }

    #[test]
    fn test_set_error_names_field() {
        let fields = Audit::fields();
        let mut audit = Audit::default();
        match fields[0].set(&mut audit, &Value::Text("x".into())) {
            Err(Error::Type(te)) => assert_eq!(te.column.as_deref(), Some("version")),
            other => panic!("expected type error, got {:?}", other),
        }
    }

    #[test]
    fn test_embedded_set_error_names_full_path() {
        let fields = Invoice::fields();
        let mut invoice = Invoice::default();
        match fields[2].set(&mut invoice, &Value::Text("x".into())) {
            Err(Error::Type(te)) => assert_eq!(te.column.as_deref(), Some("audit.version")),
            other => panic!("expected type error, got {:?}", other),
        }
        assert_eq!(invoice.audit.version, 0);
    }

    #[test]
    fn test_computed_field() {
        let field = Field::<Audit>::computed(
            "flag",
            SqlType::Boolean,
            |a| Value::Bool(a.version > 0),
            |a, v| {
                a.version = i32::from(bool::from_value(v)?);
                Ok(())
            },
        );
        let mut audit = Audit::default();
        field.set(&mut audit, &Value::Bool(true)).unwrap();
        assert_eq!(audit.version, 1);
        assert_eq!(field.get(&audit), Value::Bool(true));
    }
}
