use super::*;
use crate::error::MigrateError;
use crate::types::SqlValue;
use rusqlite::Connection;

fn sample_catalog() -> SqliteCatalog {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE users (id INTEGER, name TEXT);
         INSERT INTO users VALUES (1, 'a'), (2, 'b');
         CREATE TABLE \"order\" (\"select\" INTEGER, note);
         INSERT INTO \"order\" VALUES (10, NULL);
         CREATE TABLE blobs (payload BLOB, ratio REAL);
         INSERT INTO blobs VALUES (x'0102', 0.5);
         CREATE VIEW user_names AS SELECT name FROM users;",
    )
    .unwrap();
    SqliteCatalog::from_connection(conn)
}

#[tokio::test]
async fn test_list_tables_in_catalog_order_without_views() {
    let mut catalog = sample_catalog();
    let tables = catalog.list_tables().await.unwrap();
    assert_eq!(tables, vec!["users", "order", "blobs"]);
}

#[tokio::test]
async fn test_list_tables_includes_internal_tables() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE seq (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT);")
        .unwrap();
    let mut catalog = SqliteCatalog::from_connection(conn);
    let tables = catalog.list_tables().await.unwrap();
    assert!(tables.contains(&"sqlite_sequence".to_string()));
}

#[tokio::test]
async fn test_describe_columns_in_ordinal_order() {
    let mut catalog = sample_catalog();
    let columns = catalog.describe_columns("users").await.unwrap();
    assert_eq!(
        columns,
        vec![
            ColumnDescriptor::new("id", "INTEGER"),
            ColumnDescriptor::new("name", "TEXT"),
        ]
    );
}

#[tokio::test]
async fn test_describe_untyped_column_has_empty_type() {
    let mut catalog = sample_catalog();
    let columns = catalog.describe_columns("order").await.unwrap();
    assert_eq!(columns[1], ColumnDescriptor::new("note", ""));
}

#[tokio::test]
async fn test_describe_unknown_table_is_empty() {
    let mut catalog = sample_catalog();
    let columns = catalog.describe_columns("missing").await.unwrap();
    assert!(columns.is_empty());
}

#[tokio::test]
async fn test_fetch_rows_follow_column_order() {
    let mut catalog = sample_catalog();
    let mut columns = catalog.describe_columns("users").await.unwrap();
    columns.reverse();
    let rows = catalog.fetch_rows("users", &columns).await.unwrap();
    assert_eq!(
        rows,
        vec![
            vec![SqlValue::Text("a".into()), SqlValue::Integer(1)],
            vec![SqlValue::Text("b".into()), SqlValue::Integer(2)],
        ]
    );
}

#[tokio::test]
async fn test_fetch_rows_with_reserved_names_and_storage_classes() {
    let mut catalog = sample_catalog();

    let columns = catalog.describe_columns("order").await.unwrap();
    let rows = catalog.fetch_rows("order", &columns).await.unwrap();
    assert_eq!(rows, vec![vec![SqlValue::Integer(10), SqlValue::Null]]);

    let columns = catalog.describe_columns("blobs").await.unwrap();
    let rows = catalog.fetch_rows("blobs", &columns).await.unwrap();
    assert_eq!(rows, vec![vec![SqlValue::Blob(vec![1, 2]), SqlValue::Real(0.5)]]);
}

#[tokio::test]
async fn test_fetch_rows_without_columns_fails() {
    let mut catalog = sample_catalog();
    let result = catalog.fetch_rows("users", &[]).await;
    assert!(matches!(result, Err(MigrateError::DataTransfer { .. })));
}

#[tokio::test]
async fn test_closed_catalog_is_unavailable() {
    let mut catalog = sample_catalog();
    catalog.close().await;
    assert!(!catalog.is_open());
    assert!(matches!(
        catalog.describe_columns("users").await,
        Err(MigrateError::SourceUnavailable)
    ));
    assert!(matches!(
        catalog.list_tables().await,
        Err(MigrateError::SourceUnavailable)
    ));
}

#[test]
fn test_open_missing_file_is_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.db");
    let result = SqliteCatalog::open(&path);
    assert!(matches!(result, Err(MigrateError::Connection { .. })));
    assert!(!path.exists());
}

#[test]
fn test_open_non_database_file_is_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.db");
    std::fs::write(&path, b"not a database ".repeat(64)).unwrap();
    assert!(matches!(
        SqliteCatalog::open(&path),
        Err(MigrateError::Connection { .. })
    ));
}

#[test]
fn test_open_file_prefix_is_a_plain_path() {
    // As a URI this would name an in-memory database and open fine.
    let result = SqliteCatalog::open("file::memory:");
    assert!(matches!(result, Err(MigrateError::Connection { .. })));
    assert!(!std::path::Path::new("file::memory:").exists());
}
