//! Basic validation of a table registered with a DataFusion session.
//!
//! Run with:
//! ```bash
//! cargo run --example basic_validation
//! ```

use datafusion::prelude::*;
use db_expectations::prelude::*;
use db_expectations::suites::{self, ColumnRange};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let csv_data = r#"id,name,email,age,status
1,Alice Johnson,alice@example.com,28,active
2,Bob Smith,bob@example.com,35,active
3,Charlie Brown,charlie@example.com,42,inactive
4,Diana Prince,diana@example.com,31,active
5,Eve Adams,,26,pending
6,Frank Miller,frank@example.com,131,active"#;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("users.csv");
    std::fs::write(&path, csv_data)?;

    let ctx = SessionContext::new();
    ctx.register_csv("users", path.to_string_lossy().as_ref(), CsvReadOptions::default())
        .await?;

    let validator = DatabaseValidator::from_session(ctx);

    println!("=== Pre-built expectation suites ===");
    let expectations = suites::combine([
        suites::null_checks(["id", "name", "email"]),
        suites::unique_checks(["email"]),
        suites::range_checks([("age", ColumnRange::between(18, 100))]),
        suites::set_membership_checks([("status", vec!["pending", "active", "inactive"])]),
        suites::row_count_check(1, Some(1000)),
    ]);
    let result = validator
        .validate_table("users", Some("users_validation_suite"), &expectations)
        .await?;
    println!("{}", result.to_human()?);

    println!("=== Query validation ===");
    let query_expectations = vec![
        ExpectationConfig::new(ExpectationType::ExpectColumnValuesToNotBeNull)
            .with_kwarg("column", serde_json::json!("email")),
        ExpectationConfig::new(ExpectationType::ExpectColumnValuesToBeBetween)
            .with_kwarg("column", serde_json::json!("age"))
            .with_kwarg("min_value", serde_json::json!(31))
            .with_kwarg("max_value", serde_json::json!(100)),
    ];
    let result = validator
        .validate_query(
            "SELECT * FROM users WHERE age > 30",
            &query_expectations,
            Some("senior_users"),
            Some("senior_users_suite"),
        )
        .await?;
    println!("Query validation success: {}", result.success);

    println!("\n=== Table metadata ===");
    let info = validator.get_table_info("users").await?;
    for column in &info.columns {
        println!(
            "  - {}: {} (nullable: {})",
            column.name, column.data_type, column.nullable
        );
    }
    println!("Total users: {}", validator.get_row_count("users").await?);

    validator.close().await?;
    Ok(())
}
