//! CREATE / DROP / TRUNCATE generation from table descriptors.

use crate::descriptor::{ColumnDef, TableInfo};
use crate::dialect::Dialect;

/// CREATE TABLE for a registered table.
///
/// An auto-increment key is declared inline by the dialect; any other key
/// becomes a table-level `PRIMARY KEY (...)` constraint.
pub fn create_table(info: &TableInfo, dialect: &dyn Dialect, if_not_exists: bool) -> String {
    let mut sql = String::from("CREATE TABLE ");
    if if_not_exists {
        sql.push_str("IF NOT EXISTS ");
    }
    sql.push_str(&dialect.quote_ident(&info.table));
    sql.push_str(" (\n  ");

    let mut parts: Vec<String> = info
        .mapped()
        .map(|(_, column)| column_definition(column, dialect))
        .collect();

    if !info.keys.is_empty() && !info.auto_increment() {
        let keys: Vec<String> = info
            .key_columns()
            .map(|c| dialect.quote_ident(&c.name))
            .collect();
        parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    sql.push_str(&parts.join(",\n  "));
    sql.push_str("\n)");
    sql
}

fn column_definition(column: &ColumnDef, dialect: &dyn Dialect) -> String {
    let name = dialect.quote_ident(&column.name);
    if column.is_auto_increment {
        return format!("{} {}", name, dialect.auto_increment_column(column.sql_type));
    }

    let mut def = format!(
        "{} {}",
        name,
        dialect.column_type(column.sql_type, column.max_size)
    );
    if column.not_null || column.is_key || column.is_version {
        def.push_str(" NOT NULL");
    }
    if column.unique {
        def.push_str(" UNIQUE");
    }
    def
}

pub fn drop_table(info: &TableInfo, dialect: &dyn Dialect, if_exists: bool) -> String {
    format!(
        "DROP TABLE {}{}",
        if if_exists { "IF EXISTS " } else { "" },
        dialect.quote_ident(&info.table)
    )
}

pub fn truncate_table(info: &TableInfo, dialect: &dyn Dialect) -> String {
    dialect.truncate(&dialect.quote_ident(&info.table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, PostgresDialect, SqliteDialect};
    use tablemap_core::SqlType;

    fn column(name: &str, sql_type: SqlType) -> ColumnDef {
        ColumnDef {
            field: name.to_string(),
            name: name.to_string(),
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

    fn product() -> TableInfo {
        let mut id = column("id", SqlType::BigInt);
        id.is_key = true;
        id.is_auto_increment = true;
        let mut description = column("description", SqlType::Text);
        description.max_size = Some(200);
        description.unique = true;
        let mut version = column("version", SqlType::Integer);
        version.is_version = true;
        let mut scratch = column("scratch", SqlType::Text);
        scratch.transient = true;
        TableInfo {
            type_name: "Product",
            table: "products".to_string(),
            columns: vec![id, description, version, scratch],
            keys: vec![0],
            version: Some(2),
        }
    }

    #[test]
    fn test_create_sqlite_auto_key() {
        let sql = create_table(&product(), &SqliteDialect, false);
        assert_eq!(
            sql,
            "CREATE TABLE \"products\" (\n  \
             \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n  \
             \"description\" VARCHAR(200) UNIQUE,\n  \
             \"version\" INTEGER NOT NULL\n)"
        );
    }

    #[test]
    fn test_create_postgres_if_not_exists() {
        let sql = create_table(&product(), &PostgresDialect, true);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"products\""));
        assert!(sql.contains("\"id\" BIGSERIAL PRIMARY KEY"));
        assert!(!sql.contains("scratch"));
    }

    #[test]
    fn test_create_composite_key() {
        let mut a = column("order_id", SqlType::BigInt);
        a.is_key = true;
        let mut b = column("line", SqlType::Integer);
        b.is_key = true;
        let info = TableInfo {
            type_name: "OrderLine",
            table: "order_lines".to_string(),
            columns: vec![a, b, column("qty", SqlType::Integer)],
            keys: vec![0, 1],
            version: None,
        };
        let sql = create_table(&info, &MySqlDialect, false);
        assert!(sql.contains("`order_id` BIGINT NOT NULL"));
        assert!(sql.ends_with("PRIMARY KEY (`order_id`, `line`)\n)"));
    }

    #[test]
    fn test_drop_and_truncate() {
        let info = product();
        assert_eq!(drop_table(&info, &SqliteDialect, true), "DROP TABLE IF EXISTS \"products\"");
        assert_eq!(drop_table(&info, &MySqlDialect, false), "DROP TABLE `products`");
        assert_eq!(truncate_table(&info, &SqliteDialect), "DELETE FROM \"products\"");
        assert_eq!(truncate_table(&info, &PostgresDialect), "TRUNCATE TABLE \"products\"");
    }
}
