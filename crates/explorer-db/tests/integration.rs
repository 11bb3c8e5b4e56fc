use explorer_db::{
    create_table, delete_row, insert_row, list_columns, list_rows, list_tables, update_row,
    DatabaseDir, DbError, DbRuntimeSettings,
};
use explorer_types::{DatabaseName, Ident};

fn ident(s: &str) -> Ident {
    Ident::parse(s).expect("valid identifier")
}

#[test]
fn schema_and_rows_survive_reconnection() {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let dir = DatabaseDir::create(tmp.path(), DbRuntimeSettings::default())
        .expect("failed to create database dir");
    let shop = DatabaseName::from_input("shop").expect("valid name");

    {
        let conn = dir.open(&shop).expect("failed to open shop.db");
        create_table(&conn, &ident("items"), &[ident("name"), ident("price")])
            .expect("failed to create table");
        insert_row(
            &conn,
            &ident("items"),
            &[
                ("name".to_string(), "Pen".to_string()),
                ("price".to_string(), "1.50".to_string()),
            ],
        )
        .expect("failed to insert row");
    }

    // Each request opens a fresh connection; nothing is cached between them.
    let conn = dir.open_existing(&shop).expect("shop.db should exist");
    assert_eq!(list_tables(&conn).unwrap(), vec!["items".to_string()]);
    assert_eq!(
        list_columns(&conn, &ident("items")).unwrap(),
        vec!["name", "price"]
    );

    let data = list_rows(&conn, &ident("items")).unwrap();
    assert_eq!(data.rows.len(), 1);
    assert_eq!(data.rows[0].id, 1);
    assert_eq!(data.rows[0].value_or_empty(0), "Pen");
    assert_eq!(data.rows[0].value_or_empty(1), "1.50");

    update_row(
        &conn,
        &ident("items"),
        1,
        &[
            ("price".to_string(), "2.00".to_string()),
            ("name".to_string(), "Pen".to_string()),
        ],
    )
    .unwrap();
    assert_eq!(
        list_rows(&conn, &ident("items")).unwrap().rows[0].value_or_empty(1),
        "2.00"
    );

    assert_eq!(delete_row(&conn, &ident("items"), 1).unwrap(), 1);
    assert!(list_rows(&conn, &ident("items")).unwrap().rows.is_empty());
}

#[test]
fn databases_are_isolated_files() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = DatabaseDir::create(tmp.path(), DbRuntimeSettings::default()).unwrap();
    let a = DatabaseName::parse("a.db").unwrap();
    let b = DatabaseName::parse("b.db").unwrap();

    create_table(&dir.open(&a).unwrap(), &ident("only_in_a"), &[ident("v")]).unwrap();
    let conn_b = dir.open(&b).unwrap();
    assert!(list_tables(&conn_b).unwrap().is_empty());
    assert!(matches!(
        list_columns(&conn_b, &ident("only_in_a")),
        Err(DbError::TableNotFound(_))
    ));

    let mut listed: Vec<String> = dir.list().unwrap().into_iter().map(String::from).collect();
    listed.sort();
    assert_eq!(listed, vec!["a.db".to_string(), "b.db".to_string()]);
}

#[test]
fn concurrent_writer_surfaces_busy() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = DatabaseDir::create(tmp.path(), DbRuntimeSettings { busy_timeout_ms: 10 }).unwrap();
    let name = DatabaseName::parse("locked.db").unwrap();

    let holder = dir.open(&name).unwrap();
    create_table(&holder, &ident("t"), &[ident("v")]).unwrap();
    holder.execute_batch("BEGIN EXCLUSIVE;").unwrap();

    let other = dir.open(&name).unwrap();
    let err = insert_row(&other, &ident("t"), &[("v".to_string(), "x".to_string())])
        .expect_err("exclusive lock should block the second writer");
    assert!(err.is_busy(), "expected busy error, got {err:?}");

    holder.execute_batch("COMMIT;").unwrap();
    insert_row(&other, &ident("t"), &[("v".to_string(), "x".to_string())])
        .expect("lock released");
}
