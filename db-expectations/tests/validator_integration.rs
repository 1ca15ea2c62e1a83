//! Integration tests for the database validator over in-memory tables.

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use db_expectations::prelude::*;
use db_expectations::suites::{self, ColumnRange};
use serde_json::json;
use std::sync::Arc;

/// `users`: id, email (one null), age (one out of range, one null), status.
fn users_context() -> SessionContext {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("email", DataType::Utf8, true),
        Field::new("age", DataType::Int64, true),
        Field::new("status", DataType::Utf8, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![1, 2, 3, 4])),
        Arc::new(StringArray::from(vec![
            Some("a@x.io"),
            None,
            Some("c@x.io"),
            Some("d@x"),
        ])),
        Arc::new(Int64Array::from(vec![Some(25), Some(40), Some(130), None])),
        Arc::new(StringArray::from(vec![
            "active", "inactive", "active", "banned",
        ])),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns).unwrap();

    let ctx = SessionContext::new();
    ctx.register_table(
        "users",
        Arc::new(MemTable::try_new(schema, vec![vec![batch]]).unwrap()),
    )
    .unwrap();
    ctx
}

fn validator() -> DatabaseValidator {
    DatabaseValidator::from_session(users_context())
}

#[tokio::test]
async fn test_null_checks_report_one_failure() {
    let validator = validator();
    let result = validator
        .validate_table("users", None, &suites::null_checks(["id", "email"]))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.statistics.evaluated_expectations, 2);
    assert_eq!(result.statistics.unsuccessful_expectations, 1);
    assert_eq!(result.asset_name, "users_asset_1");
    assert_eq!(result.suite_name, "users_suite_1");

    let failed: Vec<_> = result.failed_expectations().collect();
    assert_eq!(failed[0].expectation_config.column(), Some("email"));
    assert_eq!(failed[0].result.unexpected_count, Some(1));
    assert_eq!(failed[0].result.element_count, Some(4));
}

#[tokio::test]
async fn test_combined_suite() {
    let validator = validator();
    let expectations = suites::combine([
        suites::type_checks([("id", "int64"), ("email", "string")]),
        suites::range_checks([("age", ColumnRange::between(0, 120))]),
        suites::unique_checks(["id"]),
        suites::format_checks([("email", r"^[^@]+@[^@]+\.[a-z]+$")]).unwrap(),
        suites::set_membership_checks([("status", vec!["active", "inactive"])]),
        suites::row_count_check(1, Some(10)),
    ]);

    let result = validator
        .validate_table("users", Some("users_quality"), &expectations)
        .await
        .unwrap();

    assert_eq!(result.suite_name, "users_quality");
    assert_eq!(result.statistics.evaluated_expectations, 7);

    let outcomes: Vec<(String, bool)> = result
        .results
        .iter()
        .map(|r| (r.expectation_config.expectation_type.clone(), r.success))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("expect_column_values_to_be_of_type".to_string(), true),
            ("expect_column_values_to_be_of_type".to_string(), true),
            ("expect_column_values_to_be_between".to_string(), false),
            ("expect_column_values_to_be_unique".to_string(), true),
            ("expect_column_values_to_match_regex".to_string(), false),
            ("expect_column_values_to_be_in_set".to_string(), false),
            ("expect_table_row_count_to_be_between".to_string(), true),
        ]
    );

    let range = &result.results[2].result;
    assert_eq!(range.unexpected_count, Some(1));
    assert_eq!(range.partial_unexpected_list, vec![json!(130)]);

    let in_set = &result.results[5].result;
    assert_eq!(in_set.partial_unexpected_list, vec![json!("banned")]);
}

#[tokio::test]
async fn test_mostly_tolerates_failures() {
    let validator = validator();
    let expectations = suites::completeness_check(["email"], 0.75).unwrap();
    let result = validator
        .validate_table("users", None, &expectations)
        .await
        .unwrap();
    assert!(result.success);
}

#[tokio::test]
async fn test_validate_query() {
    let validator = validator();
    let expectations = suites::range_checks([("age", ColumnRange::between(0, 120))]);

    let result = validator
        .validate_query(
            "SELECT id, age FROM users WHERE age < 100",
            &expectations,
            None,
            None,
        )
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.asset_name, "query_asset_1");
    assert_eq!(result.suite_name, "query_suite_1");

    let named = validator
        .validate_query(
            "SELECT * FROM users",
            &suites::row_count_check(4, Some(4)),
            Some("all_users"),
            Some("counts"),
        )
        .await
        .unwrap();
    assert!(named.success);
    assert_eq!(named.asset_name, "all_users");
    assert!(validator
        .registered_tables()
        .unwrap()
        .contains(&"all_users".to_string()));
}

#[tokio::test]
async fn test_validate_query_rejects_non_select() {
    let validator = validator();
    let err = validator
        .validate_query("DROP TABLE users", &[], None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExpectationsError::SecurityError(_)));

    let err = validator
        .validate_query("SELECT 1; SELECT 2", &[], None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExpectationsError::SecurityError(_)));
}

#[tokio::test]
async fn test_unknown_expectation_is_skipped() {
    let validator = validator();
    let mut expectations = suites::null_checks(["id"]);
    expectations.push(ExpectationConfig::from_parts(
        "expect_column_values_to_be_dateutil_parseable",
        serde_json::Map::new(),
    ));

    let result = validator
        .validate_table("users", None, &expectations)
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.results.len(), 1);
}

#[tokio::test]
async fn test_errors_become_exception_results() {
    let validator = validator();
    let result = validator
        .validate_table("users", None, &suites::null_checks(["missing_column"]))
        .await
        .unwrap();

    assert!(!result.success);
    let info = result.results[0].exception_info.as_ref().unwrap();
    assert!(info.raised_exception);
    assert!(!info.exception_message.is_empty());
}

#[tokio::test]
async fn test_errors_propagate_without_catch() {
    let config = ValidatorConfig::default().with_catch_exceptions(false);
    let validator = DatabaseValidator::from_session_with_config(users_context(), config);
    let result = validator
        .validate_table("users", None, &suites::null_checks(["missing_column"]))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_missing_table() {
    let validator = validator();
    let err = validator
        .validate_table("orders", None, &suites::null_checks(["id"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ExpectationsError::TableNotFound { .. }));
}

#[tokio::test]
async fn test_table_info_and_row_count() {
    let validator = validator();
    let info = validator.get_table_info("users").await.unwrap();
    let names: Vec<&str> = info.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "email", "age", "status"]);
    assert_eq!(info.columns[0].data_type, "Int64");
    assert!(!info.columns[0].nullable);

    assert_eq!(validator.get_row_count("users").await.unwrap(), 4);
}

#[tokio::test]
async fn test_close_releases_assets() {
    let validator = validator();
    for _ in 0..3 {
        validator
            .validate_table("users", None, &suites::null_checks(["id"]))
            .await
            .unwrap();
    }
    // table assets only live for the duration of a validation
    assert!(validator.registered_tables().unwrap().is_empty());

    validator
        .validate_query("SELECT id FROM users", &suites::null_checks(["id"]), Some("user_ids"), None)
        .await
        .unwrap();
    assert_eq!(
        validator.registered_tables().unwrap(),
        vec!["user_ids".to_string()]
    );

    validator.close().await.unwrap();
    assert!(validator.registered_tables().unwrap().is_empty());
    assert!(!validator.session().table_exist("user_ids").unwrap());
    assert!(validator.session().table_exist("users").unwrap());

    // closing twice is fine
    validator.close().await.unwrap();
}

#[tokio::test]
async fn test_result_serialization() {
    let validator = validator();
    let result = validator
        .validate_table("users", None, &suites::null_checks(["email"]))
        .await
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert_eq!(value["success"], json!(false));
    assert_eq!(
        value["results"][0]["expectation_config"]["kwargs"]["column"],
        json!("email")
    );
    assert!(result.to_human().unwrap().contains("Validation FAILED"));
}
