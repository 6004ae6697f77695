//! Executor tests against temporary SQLite databases

use serde_json::json;
use sql_mcp::{ConnectionDescriptor, ConnectionError, ExecutionStatus, SqlExecutor};
use tempfile::TempDir;

/// Create an empty SQLite file and connect to it
async fn connect_temp() -> (TempDir, SqlExecutor) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.db");
    std::fs::File::create(&path).unwrap();

    let descriptor = ConnectionDescriptor::sqlite(&path).unwrap();
    let executor = SqlExecutor::connect(descriptor).await.unwrap();
    (dir, executor)
}

async fn seed_customers(executor: &SqlExecutor) {
    let create = executor
        .execute("CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, balance REAL)")
        .await;
    assert_eq!(create.status, ExecutionStatus::Success, "{}", create.message);

    let insert = executor
        .execute("INSERT INTO customers (id, name, balance) VALUES (1, 'Ada', 12.5), (2, 'Grace', NULL)")
        .await;
    assert_eq!(insert.status, ExecutionStatus::Success, "{}", insert.message);
}

#[tokio::test]
async fn test_non_returning_statements_have_no_rows_and_persist() {
    let (_dir, executor) = connect_temp().await;

    let create = executor
        .execute("CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, balance REAL)")
        .await;
    assert!(create.is_success());
    assert!(create.rows.is_none());

    let insert = executor
        .execute("INSERT INTO customers (id, name, balance) VALUES (1, 'Ada', 12.5)")
        .await;
    assert!(insert.is_success());
    assert!(insert.rows.is_none());
    assert_eq!(insert.message, "Data manipulation command executed successfully.");

    // A later call uses a new connection, so the insert must have been committed
    let select = executor.execute("SELECT id, name, balance FROM customers").await;
    assert!(select.is_success());
    let rows = select.rows.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(1));
    assert_eq!(rows[0]["name"], json!("Ada"));
    assert_eq!(rows[0]["balance"], json!(12.5));
}

#[tokio::test]
async fn test_rows_keep_column_order_and_nulls() {
    let (_dir, executor) = connect_temp().await;
    seed_customers(&executor).await;

    let result = executor
        .execute("SELECT name, balance, id FROM customers ORDER BY id")
        .await;
    let rows = result.rows.unwrap();

    let columns: Vec<_> = rows[0].keys().cloned().collect();
    assert_eq!(columns, vec!["name", "balance", "id"]);
    assert_eq!(rows[1]["balance"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_query_without_matches_returns_empty_rows() {
    let (_dir, executor) = connect_temp().await;
    seed_customers(&executor).await;

    let result = executor
        .execute("SELECT * FROM customers WHERE name = 'Nobody'")
        .await;

    assert!(result.is_success());
    assert_eq!(result.rows, Some(Vec::new()));
}

#[tokio::test]
async fn test_database_errors_become_error_results() {
    let (_dir, executor) = connect_temp().await;

    for statement in [
        "SELECT * FROM missing_table",
        "SELEC broken syntax",
        "INSERT INTO nowhere VALUES (1)",
    ] {
        let result = executor.execute(statement).await;
        assert_eq!(result.status, ExecutionStatus::Error, "{statement}");
        assert!(result.rows.is_none());
        assert!(result.message.starts_with("SQL execution failed: "));
        assert!(result.message.len() > "SQL execution failed: ".len());
    }
}

#[tokio::test]
async fn test_failed_write_leaves_data_untouched() {
    let (_dir, executor) = connect_temp().await;
    seed_customers(&executor).await;

    let duplicate = executor
        .execute("INSERT INTO customers (id, name) VALUES (1, 'Duplicate')")
        .await;
    assert_eq!(duplicate.status, ExecutionStatus::Error);

    let count = executor.execute("SELECT COUNT(*) AS total FROM customers").await;
    assert_eq!(count.rows.unwrap()[0]["total"], json!(2));
}

#[tokio::test]
async fn test_reads_are_idempotent() {
    let (_dir, executor) = connect_temp().await;
    seed_customers(&executor).await;

    let first = executor.execute("SELECT * FROM customers ORDER BY id").await;
    let second = executor.execute("SELECT * FROM customers ORDER BY id").await;

    assert!(first.is_success());
    assert_eq!(first.rows, second.rows);
}

#[tokio::test]
async fn test_update_is_visible_to_next_select() {
    let (_dir, executor) = connect_temp().await;
    seed_customers(&executor).await;

    let update = executor
        .execute("UPDATE customers SET balance = 99.0 WHERE name = 'Grace'")
        .await;
    assert!(update.is_success());
    assert!(update.rows.is_none());

    let select = executor
        .execute("SELECT balance FROM customers WHERE name = 'Grace'")
        .await;
    assert_eq!(select.rows.unwrap()[0]["balance"], json!(99.0));
}

#[tokio::test]
async fn test_probe_fails_when_file_disappears() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gone.db");
    std::fs::File::create(&path).unwrap();
    let descriptor = ConnectionDescriptor::sqlite(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let err = SqlExecutor::connect(descriptor).await.unwrap_err();
    assert!(matches!(err, ConnectionError::Unreachable(_)));
}

#[tokio::test]
async fn test_in_memory_sqlite_never_reaches_the_executor() {
    // Each statement gets its own connection, so an in-memory database
    // would lose every change between calls
    let err = ConnectionDescriptor::parse("sqlite::memory:").unwrap_err();
    assert!(matches!(err, ConnectionError::InMemoryDatabase));
}
