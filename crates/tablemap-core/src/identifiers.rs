//! SQL identifier quoting and validation utilities.

use regex::Regex;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Quote a SQL identifier using ANSI double-quoting.
///
/// Embedded double-quotes are escaped by doubling them (`"` → `""`).
///
/// # Examples
///
/// ```
/// use tablemap_core::quote_ident;
///
/// assert_eq!(quote_ident("products"), "\"products\"");
/// assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
/// ```
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a SQL identifier using MySQL backtick quoting.
///
/// ```
/// use tablemap_core::quote_ident_mysql;
///
/// assert_eq!(quote_ident_mysql("products"), "`products`");
/// ```
#[inline]
pub fn quote_ident_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Whether `name` is a plain identifier usable as a table or column name.
///
/// Registration rejects anything else so generated SQL never depends on
/// quoting to stay well-formed.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Default column name for a record field: the last path segment, lower-cased.
///
/// ```
/// use tablemap_core::default_column_name;
///
/// assert_eq!(default_column_name("UnitPrice"), "unitprice");
/// assert_eq!(default_column_name("audit.version"), "version");
/// ```
pub fn default_column_name(field_path: &str) -> String {
    field_path
        .rsplit('.')
        .next()
        .unwrap_or(field_path)
        .to_lowercase()
}
