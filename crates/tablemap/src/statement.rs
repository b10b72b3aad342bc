//! SQL statement templates built from table descriptors.
//!
//! Each builder is a pure function of a [`TableInfo`] and a [`Dialect`]. It
//! returns the SQL text plus the ordered list of [`Bind`] sources the caller
//! resolves against a record when the statement runs.

use crate::descriptor::TableInfo;
use crate::dialect::Dialect;

/// Where a bind parameter's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bind {
    /// Current value of the column at this index.
    Field(usize),
    /// Current value of the version column at this index, plus one.
    BumpedVersion(usize),
}

/// A parameterized statement template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<Bind>,
    /// The statement returns the generated key as a one-column row.
    pub returning: bool,
}

/// Accumulates SQL text and placeholders in bind order.
struct Builder<'d> {
    dialect: &'d dyn Dialect,
    sql: String,
    binds: Vec<Bind>,
}

impl<'d> Builder<'d> {
    fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            sql: String::with_capacity(128),
            binds: Vec::new(),
        }
    }

    fn push(&mut self, text: &str) -> &mut Self {
        self.sql.push_str(text);
        self
    }

    fn ident(&mut self, name: &str) -> &mut Self {
        let quoted = self.dialect.quote_ident(name);
        self.push(&quoted)
    }

    fn param(&mut self, bind: Bind) -> &mut Self {
        self.binds.push(bind);
        let placeholder = self.dialect.placeholder(self.binds.len());
        self.push(&placeholder)
    }

    /// `"k1" = ? AND "k2" = ?`
    fn key_predicate(&mut self, info: &TableInfo) -> &mut Self {
        for (n, &i) in info.keys.iter().enumerate() {
            if n > 0 {
                self.push(" AND ");
            }
            self.ident(&info.columns[i].name).push(" = ").param(Bind::Field(i));
        }
        self
    }

    fn finish(self, returning: bool) -> Statement {
        Statement {
            sql: self.sql,
            binds: self.binds,
            returning,
        }
    }
}

/// INSERT of every mapped column except a generated key.
pub fn build_insert(info: &TableInfo, dialect: &dyn Dialect) -> Statement {
    let columns: Vec<usize> = info
        .mapped()
        .filter(|(_, c)| !c.is_auto_increment)
        .map(|(i, _)| i)
        .collect();

    let mut b = Builder::new(dialect);
    b.push("INSERT INTO ").ident(&info.table);

    if columns.is_empty() {
        b.push(" DEFAULT VALUES");
    } else {
        b.push(" (");
        for (n, &i) in columns.iter().enumerate() {
            if n > 0 {
                b.push(", ");
            }
            b.ident(&info.columns[i].name);
        }
        b.push(") VALUES (");
        for (n, &i) in columns.iter().enumerate() {
            if n > 0 {
                b.push(", ");
            }
            b.param(Bind::Field(i));
        }
        b.push(")");
    }

    let returning = info.auto_increment() && dialect.returns_generated_key();
    if returning {
        if let Some(key) = info.key_columns().next() {
            b.push(" RETURNING ").ident(&key.name);
        }
    }

    b.finish(returning)
}

/// UPDATE of every mapped non-key column, guarded by the version if any.
///
/// Returns `None` when the table has no key or nothing to SET.
pub fn build_update(info: &TableInfo, dialect: &dyn Dialect) -> Option<Statement> {
    if info.keys.is_empty() {
        return None;
    }
    let set: Vec<usize> = info
        .mapped()
        .filter(|(_, c)| !c.is_key)
        .map(|(i, _)| i)
        .collect();
    if set.is_empty() {
        return None;
    }

    let mut b = Builder::new(dialect);
    b.push("UPDATE ").ident(&info.table).push(" SET ");
    for (n, &i) in set.iter().enumerate() {
        if n > 0 {
            b.push(", ");
        }
        let bind = if info.version == Some(i) {
            Bind::BumpedVersion(i)
        } else {
            Bind::Field(i)
        };
        b.ident(&info.columns[i].name).push(" = ").param(bind);
    }

    b.push(" WHERE ").key_predicate(info);
    if let Some(v) = info.version {
        b.push(" AND ")
            .ident(&info.columns[v].name)
            .push(" = ")
            .param(Bind::Field(v));
    }

    Some(b.finish(false))
}

/// DELETE by key. The version is not checked.
pub fn build_delete(info: &TableInfo, dialect: &dyn Dialect) -> Option<Statement> {
    if info.keys.is_empty() {
        return None;
    }
    let mut b = Builder::new(dialect);
    b.push("DELETE FROM ")
        .ident(&info.table)
        .push(" WHERE ")
        .key_predicate(info);
    Some(b.finish(false))
}

/// SELECT of every mapped column, in field order, by key.
pub fn build_select_by_key(info: &TableInfo, dialect: &dyn Dialect) -> Option<Statement> {
    if info.keys.is_empty() {
        return None;
    }
    let mut b = Builder::new(dialect);
    b.push("SELECT ").column_list(info);
    b.push(" FROM ")
        .ident(&info.table)
        .push(" WHERE ")
        .key_predicate(info);
    Some(b.finish(false))
}

impl Builder<'_> {
    fn column_list(&mut self, info: &TableInfo) -> &mut Self {
        for (n, (_, column)) in info.mapped().enumerate() {
            if n > 0 {
                self.push(", ");
            }
            self.ident(&column.name);
        }
        self
    }
}
