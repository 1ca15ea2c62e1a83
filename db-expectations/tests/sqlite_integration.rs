//! End-to-end validation against a SQLite database file.

#![cfg(feature = "sqlite")]

use db_expectations::hooks::validate_after;
use db_expectations::prelude::*;
use db_expectations::suites::{self, ColumnRange};
use tempfile::TempDir;

fn create_database() -> Result<(TempDir, String)> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("shop.db");

    let conn = rusqlite::Connection::open(&path)
        .map_err(|e| ExpectationsError::data_source("SQLite", e.to_string()))?;
    conn.execute_batch(
        "CREATE TABLE customer_orders (
            order_id INTEGER PRIMARY KEY,
            customer_id INTEGER NOT NULL,
            amount REAL NOT NULL,
            status TEXT
        );
        INSERT INTO customer_orders (order_id, customer_id, amount, status) VALUES
            (1, 100, 99.99, 'completed'),
            (2, 101, 149.50, 'completed'),
            (3, 102, 75.00, 'pending'),
            (4, 103, 200.00, NULL),
            (5, 104, 50.00, 'completed');",
    )
    .map_err(|e| ExpectationsError::data_source("SQLite", e.to_string()))?;

    let url = format!("sqlite:///{}", path.display());
    Ok((dir, url))
}

#[tokio::test]
async fn test_validate_sqlite_table() -> Result<()> {
    let (_dir, url) = create_database()?;
    let validator = DatabaseValidator::connect(&url).await?;
    assert_eq!(validator.connection().map(|c| c.database_type()), Some("SQLite"));

    let expectations = suites::combine([
        suites::null_checks(["order_id", "customer_id", "status"]),
        suites::unique_checks(["order_id"]),
        suites::range_checks([("amount", ColumnRange::between(0, 500))]),
        suites::set_membership_checks([("status", vec!["completed", "pending"])]),
        suites::row_count_check(1, Some(100)),
    ]);

    let result = validator
        .validate_table("customer_orders", None, &expectations)
        .await?;

    assert!(!result.success);
    assert_eq!(result.asset_name, "customer_orders_asset_1");
    // only the status null check fails; nulls are ignored by the set check
    assert_eq!(result.statistics.unsuccessful_expectations, 1);
    let failed: Vec<_> = result.failed_expectations().collect();
    assert_eq!(failed[0].expectation_config.column(), Some("status"));
    assert!(validator.registered_tables()?.is_empty());

    assert_eq!(validator.get_row_count("customer_orders").await?, 5);

    validator.close().await?;
    assert!(validator.registered_tables()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_validate_sqlite_query() -> Result<()> {
    let (_dir, url) = create_database()?;
    let validator = DatabaseValidator::connect(&url).await?;

    let result = validator
        .validate_query(
            "SELECT amount FROM customer_orders WHERE status = 'completed'",
            &suites::combine([
                suites::range_checks([("amount", ColumnRange::at_least(50))]),
                suites::row_count_check(3, Some(3)),
            ]),
            Some("completed_orders"),
            None,
        )
        .await?;

    assert!(result.success, "{}", result.to_human()?);
    assert_eq!(result.asset_name, "completed_orders");
    Ok(())
}

#[tokio::test]
async fn test_post_validation_hook() -> Result<()> {
    let (_dir, url) = create_database()?;
    let validator = DatabaseValidator::connect(&url).await?;
    let hook = ValidationHook::table("customer_orders", suites::unique_checks(["order_id"]));

    let processed = validate_after(&validator, &hook, "process_orders", || async { 5 }).await?;
    assert_eq!(processed, 5);
    Ok(())
}

#[tokio::test]
async fn test_missing_sqlite_table() -> Result<()> {
    let (_dir, url) = create_database()?;
    let validator = DatabaseValidator::connect(&url).await?;
    let result = validator
        .validate_table("no_such_table", None, &suites::null_checks(["id"]))
        .await;
    assert!(result.is_err());
    Ok(())
}
