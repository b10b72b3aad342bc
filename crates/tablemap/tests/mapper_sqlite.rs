use tablemap::prelude::*;
use tablemap::{ConfigErrorKind, DriverErrorKind, MemorySink};
use tablemap_sqlite::SqliteConnection;

use std::sync::Arc;

#[derive(Debug, Default, Clone, PartialEq)]
struct Product {
    id: i64,
    sku: String,
    description: String,
    unit_price: i32,
    version: i32,
}

impl Record for Product {
    fn fields() -> Vec<Field<Self>> {
        vec![
            field!(Product, id, SqlType::BigInt),
            field!(Product, sku, SqlType::Text),
            field!(Product, description, SqlType::Text),
            field!(Product, unit_price, SqlType::Integer),
            field!(Product, version, SqlType::Integer),
        ]
    }
}

fn product(sku: &str, description: &str, unit_price: i32) -> Product {
    Product {
        sku: sku.to_string(),
        description: description.to_string(),
        unit_price,
        ..Default::default()
    }
}

fn mapper() -> Mapper<SqliteConnection> {
    let conn = SqliteConnection::open_memory().expect("open sqlite memory db");
    let mut mapper = Mapper::new(conn);
    mapper
        .add_table_with_name::<Product>("products")
        .expect("register products")
        .set_keys(true, &["id"])
        .expect("set keys")
        .set_version_col("version")
        .expect("set version")
        .set_unique("sku", true)
        .expect("set unique");
    mapper.create_tables().expect("create tables");
    mapper
}

fn count(mapper: &Mapper<SqliteConnection>, table: &str) -> i64 {
    mapper
        .select_int(&format!("SELECT COUNT(*) FROM {}", table), &[])
        .expect("count rows")
}

#[test]
fn insert_then_get_round_trips() {
    let mapper = mapper();

    let mut socks = product("SOCK-1", "Wool socks", 450);
    mapper.insert_one(&mut socks).expect("insert");
    assert!(socks.id > 0);
    assert_eq!(socks.version, 1);

    let loaded: Product = mapper.get(&[Value::BigInt(socks.id)]).expect("get");
    assert_eq!(loaded, socks);

    let missing = mapper.get::<Product>(&[Value::BigInt(socks.id + 100)]);
    assert!(matches!(missing, Err(Error::NotFound(_))));
}

#[test]
fn generated_keys_are_distinct() {
    let mapper = mapper();
    let mut batch = vec![
        product("A", "first", 1),
        product("B", "second", 2),
        product("C", "third", 3),
    ];
    mapper.insert(&mut batch).expect("insert batch");

    assert!(batch[0].id < batch[1].id);
    assert!(batch[1].id < batch[2].id);
    assert!(batch.iter().all(|p| p.version == 1));
    assert_eq!(count(&mapper, "products"), 3);
}

#[test]
fn update_bumps_version_each_time() {
    let mapper = mapper();
    let mut p = product("SOCK-1", "Wool socks", 450);
    mapper.insert_one(&mut p).expect("insert");

    for expected in 2..=4 {
        p.unit_price += 10;
        assert!(mapper.update(&mut p).expect("update"));
        assert_eq!(p.version, expected);
    }

    let loaded: Product = mapper.get(&[Value::BigInt(p.id)]).expect("get");
    assert_eq!(loaded.version, 4);
    assert_eq!(loaded.unit_price, 480);
}

#[test]
fn stale_copy_cannot_overwrite() {
    let mapper = mapper();
    let mut original = product("SOCK-1", "Wool socks", 450);
    mapper.insert_one(&mut original).expect("insert");

    let mut first: Product = mapper.get(&[Value::BigInt(original.id)]).expect("get");
    let mut second = first.clone();

    first.unit_price = 500;
    mapper.update(&mut first).expect("first update");

    second.unit_price = 999;
    let err = mapper.update(&mut second).unwrap_err();
    match &err {
        Error::OptimisticLock(e) => {
            assert_eq!(e.table, "products");
            assert_eq!(e.version, 1);
        }
        other => panic!("expected optimistic lock error, got {other:?}"),
    }
    assert!(err.is_optimistic_lock());
    assert_eq!(second.version, 1);

    let stored: Product = mapper.get(&[Value::BigInt(original.id)]).expect("get");
    assert_eq!(stored.unit_price, 500);
    assert_eq!(stored.version, 2);
}

#[test]
fn delete_removes_row_once() {
    let mapper = mapper();
    let mut p = product("SOCK-1", "Wool socks", 450);
    mapper.insert_one(&mut p).expect("insert");

    assert!(mapper.delete(&mut p).expect("delete"));
    assert_eq!(count(&mapper, "products"), 0);

    let again = mapper.delete(&mut p).unwrap_err();
    assert!(again.is_not_found());
}

#[test]
fn unique_violation_surfaces_as_constraint() {
    let mapper = mapper();
    mapper
        .insert_one(&mut product("DUP", "first", 1))
        .expect("insert");

    let mut second = product("DUP", "second", 2);
    second.version = 5;
    match mapper.insert_one(&mut second) {
        Err(Error::Driver(d)) => assert_eq!(d.kind, DriverErrorKind::Constraint),
        other => panic!("expected constraint error, got {other:?}"),
    }
    assert_eq!(second.version, 5);
    assert_eq!(second.id, 0);
}

#[test]
fn failed_transaction_leaves_no_rows() {
    let mapper = mapper();

    let tx = mapper.begin().expect("begin");
    let mut batch = vec![
        product("A", "first", 1),
        product("A", "duplicate sku", 2),
        product("C", "third", 3),
    ];
    match tx.insert(&mut batch) {
        Err(Error::Batch(b)) => assert_eq!(b.index, 1),
        other => panic!("expected batch error, got {other:?}"),
    }
    assert!(tx.end().is_err());

    assert_eq!(count(&mapper, "products"), 0);
    assert!(!mapper.connection().in_transaction());
}

#[test]
fn committed_transaction_is_visible() {
    let mapper = mapper();
    let mut kept = product("SOCK-1", "Wool socks", 450);
    mapper.insert_one(&mut kept).expect("insert");

    let tx = mapper.begin().expect("begin");
    tx.insert_one(&mut product("SOCK-2", "Cotton socks", 300))
        .expect("insert in tx");
    kept.unit_price = 475;
    assert!(tx.update(&mut kept).expect("update in tx"));
    let inside: Product = tx.get(&[Value::BigInt(kept.id)]).expect("get in tx");
    assert_eq!(inside.unit_price, 475);
    tx.end().expect("commit");

    assert_eq!(count(&mapper, "products"), 2);
    let stored: Product = mapper.get(&[Value::BigInt(kept.id)]).expect("get");
    assert_eq!(stored.version, 2);
}

#[test]
fn select_maps_rows_by_column_name() {
    let mapper = mapper();
    mapper
        .insert(&mut [
            product("A", "cheap", 100),
            product("B", "mid", 500),
            product("C", "dear", 900),
        ])
        .expect("insert");

    let dear: Vec<Product> = mapper
        .select(
            "SELECT * FROM products WHERE unit_price > ? ORDER BY unit_price",
            &[Value::Int(200)],
        )
        .expect("select");
    assert_eq!(dear.len(), 2);
    assert_eq!(dear[0].sku, "B");
    assert_eq!(dear[1].description, "dear");

    // Columns left out of the query keep their default
    let partial: Product = mapper
        .select_one("SELECT sku FROM products WHERE sku = ?", &[Value::from("C")])
        .expect("select one");
    assert_eq!(partial.sku, "C");
    assert_eq!(partial.unit_price, 0);

    assert!(matches!(
        mapper.select_one::<Product>("SELECT * FROM products", &[]),
        Err(Error::Integrity(_))
    ));
    assert!(
        mapper
            .select_one::<Product>("SELECT * FROM products WHERE sku = 'Z'", &[])
            .unwrap_err()
            .is_not_found()
    );

    match mapper.select::<Product>("SELECT sku, 1 AS extra FROM products", &[]) {
        Err(Error::Config(c)) => assert_eq!(c.kind, ConfigErrorKind::UnknownField),
        other => panic!("expected unknown field error, got {other:?}"),
    }
}

#[test]
fn scalar_helpers_read_single_values() {
    let mapper = mapper();
    mapper
        .insert_one(&mut product("A", "cheap", 100))
        .expect("insert");

    assert_eq!(
        mapper
            .select_int("SELECT MAX(unit_price) FROM products", &[])
            .expect("max"),
        100
    );
    assert_eq!(
        mapper
            .select_nullable_int("SELECT unit_price FROM products WHERE sku = 'Z'", &[])
            .expect("missing"),
        None
    );
    assert_eq!(
        mapper
            .select_str("SELECT description FROM products WHERE sku = ?", &[Value::from("A")])
            .expect("description"),
        "cheap"
    );
}

#[test]
fn ddl_helpers_manage_registered_tables() {
    let mapper = mapper();
    mapper
        .insert_one(&mut product("A", "cheap", 100))
        .expect("insert");

    mapper.truncate_tables().expect("truncate");
    assert_eq!(count(&mapper, "products"), 0);

    mapper.create_tables_if_not_exists().expect("create again");
    mapper.drop_tables().expect("drop");
    assert!(mapper.drop_tables().is_err());
    mapper.drop_tables_if_exists().expect("drop if exists");
    mapper.create_tables().expect("recreate");
    assert_eq!(count(&mapper, "products"), 0);
}

#[test]
fn trace_sink_sees_mapped_statements() {
    let sink = Arc::new(MemorySink::new());
    let conn = SqliteConnection::open_memory().expect("open sqlite memory db");
    let mut mapper = Mapper::builder().trace_shared(sink.clone()).build(conn);
    mapper
        .add_table_with_name::<Product>("products")
        .expect("register")
        .set_keys(true, &["id"])
        .expect("set keys");
    mapper.create_tables().expect("create tables");
    mapper
        .insert_one(&mut product("A", "cheap", 100))
        .expect("insert");

    let statements = sink.statements();
    assert_eq!(statements.len(), 2);
    assert!(statements[0].starts_with("CREATE TABLE \"products\""));
    assert!(statements[1].starts_with("INSERT INTO \"products\""));
    assert!(sink.events().iter().all(|e| e.error.is_none()));
}

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn mapper_is_shareable_across_threads() {
    assert_send_sync::<Mapper<SqliteConnection>>();

    let mapper = mapper();
    let mut seeded: Vec<Product> = (0..4)
        .map(|i| product(&format!("SKU-{i}"), "seeded", 100))
        .collect();
    mapper.insert(&mut seeded).expect("seed");

    std::thread::scope(|scope| {
        for p in &seeded {
            let mapper = &mapper;
            let id = p.id;
            scope.spawn(move || {
                for _ in 0..5 {
                    let mut current: Product = mapper.get(&[Value::BigInt(id)]).expect("get");
                    current.unit_price += 1;
                    assert!(mapper.update(&mut current).expect("update"));
                }
            });
        }
    });

    for p in &seeded {
        let stored: Product = mapper.get(&[Value::BigInt(p.id)]).expect("get");
        assert_eq!(stored.unit_price, 105);
        assert_eq!(stored.version, 6);
    }
}

#[test]
fn mapper_calls_during_a_transaction_join_it() {
    let mapper = mapper();

    let tx = mapper.begin().expect("begin");
    mapper
        .insert_one(&mut product("AMBIENT", "written while tx open", 1))
        .expect("ambient insert");
    tx.insert_one(&mut product("A", "first", 1))
        .expect("insert in tx");
    assert!(tx.insert_one(&mut product("A", "duplicate sku", 2)).is_err());
    assert!(tx.end().is_err());

    assert_eq!(count(&mapper, "products"), 0);
}

#[test]
fn transaction_ended_by_a_trigger_leaves_mapper_usable() {
    let mapper = mapper();
    mapper
        .connection()
        .execute_raw(
            "CREATE TRIGGER products_guard BEFORE INSERT ON products \
             WHEN NEW.sku = 'BAD' BEGIN SELECT RAISE(ROLLBACK, 'bad sku'); END",
        )
        .expect("create trigger");

    let tx = mapper.begin().expect("begin");
    tx.insert_one(&mut product("OK", "fine", 1))
        .expect("insert in tx");
    assert!(tx.insert_one(&mut product("BAD", "refused", 2)).is_err());
    match tx.end() {
        Err(Error::Driver(d)) => assert_eq!(d.kind, DriverErrorKind::Constraint),
        other => panic!("expected constraint error, got {other:?}"),
    }
    assert!(!mapper.connection().in_transaction());

    let tx = mapper.begin().expect("begin after sqlite rollback");
    tx.insert_one(&mut product("LATER", "kept", 3))
        .expect("insert in tx");
    tx.end().expect("commit");
    assert_eq!(count(&mapper, "products"), 1);
}
