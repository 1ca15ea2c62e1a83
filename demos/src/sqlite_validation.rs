//! Validating a SQLite database through a connection URL.
//!
//! Run with:
//! ```bash
//! cargo run --example sqlite_validation --features sqlite
//! ```

use db_expectations::logging::setup::{init_logging, LoggingConfig};
use db_expectations::prelude::*;
use db_expectations::suites::{self, ColumnRange};

fn create_database(path: &std::path::Path) -> rusqlite::Result<()> {
    let conn = rusqlite::Connection::open(path)?;
    conn.execute_batch(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            age INTEGER,
            status TEXT
        );
        INSERT INTO users (id, name, email, age, status) VALUES
            (1, 'Alice Johnson', 'alice@example.com', 28, 'active'),
            (2, 'Bob Smith', 'bob@example.com', 35, 'active'),
            (3, 'Charlie Brown', 'charlie@example.com', 42, 'inactive'),
            (4, 'Diana Prince', 'diana@example.com', 31, 'active'),
            (5, 'Eve Adams', 'eve@example.com', 26, 'pending');",
    )
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::default().with_library_level(tracing::Level::INFO))?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("example.db");
    create_database(&path)?;

    let validator = DatabaseValidator::connect(&format!("sqlite:///{}", path.display())).await?;
    if let Some(connection) = validator.connection() {
        println!("Connected to {connection} ({})", connection.datasource_name());
    }

    let expectations = suites::combine([
        suites::null_checks(["id", "name", "email"]),
        suites::unique_checks(["email"]),
        suites::range_checks([("age", ColumnRange::between(18, 100))]),
        suites::format_checks([("email", r"^[^@\s]+@[^@\s]+\.[a-z]+$")])?,
        suites::row_count_check(1, Some(1000)),
    ]);

    let result = validator
        .validate_table("users", Some("users_validation_suite"), &expectations)
        .await?;
    println!("{}", result.to_human()?);

    let active = validator
        .query("SELECT name, email FROM users WHERE status = 'active'")
        .await?;
    println!(
        "{}",
        datafusion::arrow::util::pretty::pretty_format_batches(&active)?
    );

    validator.close().await?;
    Ok(())
}
