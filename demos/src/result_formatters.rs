//! Rendering validation results with the built-in formatters.
//!
//! Run with:
//! ```bash
//! cargo run --example result_formatters
//! ```

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use db_expectations::formatters::{HumanFormatter, JsonFormatter};
use db_expectations::prelude::*;
use db_expectations::suites::{self, ExpectationSuite};
use std::sync::Arc;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("product_id", DataType::Int64, false),
        Field::new("sku", DataType::Utf8, true),
        Field::new("price", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 2, 4])),
            Arc::new(StringArray::from(vec![
                Some("AB-001"),
                Some("AB-002"),
                Some("bad sku"),
                None,
            ])),
            Arc::new(Float64Array::from(vec![Some(9.99), Some(-1.0), Some(20.0), None])),
        ],
    )?;
    let ctx = SessionContext::new();
    ctx.register_table("products", Arc::new(MemTable::try_new(schema, vec![vec![batch]])?))?;

    let suite = ExpectationSuite::new("products_suite").with_expectations(suites::combine([
        suites::unique_checks(["product_id"]),
        suites::format_checks([("sku", r"^[A-Z]{2}-\d{3}$")])?,
        suites::range_checks([("price", suites::ColumnRange::between(0.0, 1000.0))]),
    ]));
    println!("Suite definition:\n{}\n", suite.to_json()?);

    let validator = DatabaseValidator::from_session(ctx);
    let result = validator
        .validate_table("products", Some(suite.name.as_str()), &suite.expectations)
        .await?;

    println!("=== Human (default) ===");
    println!("{}", HumanFormatter::new().format(&result)?);

    println!("=== Human (CI) ===");
    let ci = FormatterConfig::ci().with_max_failures(Some(1));
    println!("{}", HumanFormatter::with_config(ci).format(&result)?);

    println!("=== JSON (failures only) ===");
    let failures_only = FormatterConfig::default().with_colors(false);
    println!("{}", JsonFormatter::with_config(failures_only).format(&result)?);

    println!("=== JSON (compact) ===");
    println!("{}", result.to_json()?);

    validator.close().await?;
    Ok(())
}
