//! An ETL step guarded by validation hooks.
//!
//! Raw sales data is checked before the transform (failures are only
//! logged), and the cleaned table is checked afterwards (failures abort).
//!
//! Run with:
//! ```bash
//! cargo run --example etl_hooks
//! ```

use datafusion::prelude::*;
use db_expectations::hooks::{validate_after, validate_before};
use db_expectations::logging::setup::{init_logging, LoggingConfig};
use db_expectations::prelude::*;
use db_expectations::suites::{self, ColumnRange};

const RAW_SALES: &str = r#"sale_id,customer_name,product,quantity,unit_price,sale_date,region
1,John Doe,Laptop,2,999.99,2025-12-01,North
2,Jane Smith,Mouse,5,25.50,2025-12-01,South
3,Bob Johnson,Keyboard,3,75.00,2025-12-02,East
4,Alice Brown,Monitor,1,299.99,2025-12-02,West
5,Charlie Wilson,Laptop,1,999.99,2025-12-03,North
6,,Mouse,10,25.50,2025-12-03,South
7,Diana Prince,Keyboard,-1,75.00,2025-12-04,East
8,Eve Taylor,Monitor,2,299.99,2025-12-04,"#;

/// Copies valid rows from `raw_sales` into `cleaned_sales`.
async fn clean_sales(ctx: &SessionContext) -> Result<usize> {
    let cleaned = ctx
        .sql(
            "SELECT sale_id, customer_name, product, quantity, unit_price, \
                    quantity * unit_price AS total_amount, sale_date, region \
             FROM raw_sales \
             WHERE customer_name IS NOT NULL AND quantity > 0 AND region IS NOT NULL",
        )
        .await?;
    let rows = cleaned.clone().count().await?;
    ctx.register_table("cleaned_sales", cleaned.into_view())?;
    Ok(rows)
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::default())?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("raw_sales.csv");
    std::fs::write(&path, RAW_SALES)?;

    let ctx = SessionContext::new();
    ctx.register_csv("raw_sales", path.to_string_lossy().as_ref(), CsvReadOptions::default())
        .await?;
    let validator = DatabaseValidator::from_session(ctx);

    let raw_checks = ValidationHook::table(
        "raw_sales",
        suites::combine([
            suites::null_checks(["sale_id", "customer_name", "region"]),
            suites::range_checks([("quantity", ColumnRange::at_least(1))]),
        ]),
    )
    .with_suite_name("raw_sales_checks")
    .with_raise_on_failure(false);

    let cleaned_checks = ValidationHook::table(
        "cleaned_sales",
        suites::combine([
            suites::null_checks(["customer_name", "region"]),
            suites::range_checks([("quantity", ColumnRange::between(1, 1000))]),
            suites::unique_checks(["sale_id"]),
        ]),
    );

    // warns about the dirty source, then runs the transform
    let rows = validate_before(&validator, &raw_checks, "clean_sales", || {
        clean_sales(validator.session())
    })
    .await??;
    println!("Cleaned {rows} rows");

    let summary = validate_after(&validator, &cleaned_checks, "summarize_sales", || async {
        validator
            .query("SELECT region, SUM(total_amount) AS revenue FROM cleaned_sales GROUP BY region")
            .await
    })
    .await??;
    println!(
        "{}",
        datafusion::arrow::util::pretty::pretty_format_batches(&summary)?
    );

    validator.close().await?;
    Ok(())
}
