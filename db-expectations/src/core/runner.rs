//! Runs a list of expectation descriptors against a registered asset.

use super::validation_context::{ValidationContext, CURRENT_CONTEXT};
use super::{ExpectationResult, ValidationResult, ValidatorConfig};
use crate::constraints::build_constraint;
use crate::expectation::ExpectationConfig;
use crate::prelude::*;
use datafusion::prelude::SessionContext;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Evaluates `expectations` in order against the table `asset_name`.
///
/// Descriptors with an unknown `expectation_type` are skipped. Evaluation
/// errors become failed results when `config.catch_exceptions` is set and are
/// returned otherwise.
#[instrument(skip(ctx, config, expectations), fields(suite.name = %suite_name, asset.name = %asset_name, expectations = expectations.len()))]
pub async fn run_expectations(
    ctx: &SessionContext,
    config: &ValidatorConfig,
    suite_name: &str,
    asset_name: &str,
    expectations: &[ExpectationConfig],
) -> Result<ValidationResult> {
    let start_time = Instant::now();
    let validation_ctx = ValidationContext::new(asset_name);
    let results = CURRENT_CONTEXT
        .scope(validation_ctx, evaluate_all(ctx, config, expectations))
        .await?;

    let result = ValidationResult::new(suite_name, asset_name, results);
    info!(
        suite.name = %suite_name,
        asset.name = %asset_name,
        validation.success = result.success,
        validation.evaluated = result.statistics.evaluated_expectations,
        validation.unsuccessful = result.statistics.unsuccessful_expectations,
        validation.duration_ms = start_time.elapsed().as_millis() as u64,
        "Validation completed"
    );
    Ok(result)
}

async fn evaluate_all(
    ctx: &SessionContext,
    config: &ValidatorConfig,
    expectations: &[ExpectationConfig],
) -> Result<Vec<ExpectationResult>> {
    let mut results = Vec::with_capacity(expectations.len());

    for expectation in expectations {
        let Some(kind) = expectation.kind() else {
            warn!(
                expectation.kind = %expectation.expectation_type,
                "Skipping unsupported expectation type"
            );
            continue;
        };

        let evaluated = match build_constraint(expectation, kind, config) {
            Ok(constraint) => constraint.evaluate(ctx).await,
            Err(e) => Err(e),
        };

        match evaluated {
            Ok(outcome) => {
                if outcome.success {
                    debug!(expectation = %expectation, "Expectation met");
                } else {
                    warn!(
                        expectation = %expectation,
                        result.unexpected_count = ?outcome.result.unexpected_count,
                        result.observed_value = ?outcome.result.observed_value,
                        "Expectation not met"
                    );
                }
                results.push(ExpectationResult {
                    expectation_config: expectation.clone(),
                    success: outcome.success,
                    result: outcome.result,
                    exception_info: None,
                });
            }
            Err(e) if config.catch_exceptions => {
                warn!(expectation = %expectation, error = %e, "Expectation raised during evaluation");
                results.push(ExpectationResult::from_exception(
                    expectation.clone(),
                    e.to_string(),
                ));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectation::ExpectationType;
    use crate::suites;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use datafusion::datasource::MemTable;
    use serde_json::json;
    use std::sync::Arc;

    async fn users_context() -> SessionContext {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("email", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec![
                    Some("a@example.com"),
                    None,
                    Some("c@example.com"),
                ])),
            ],
        )
        .unwrap();
        let ctx = SessionContext::new();
        let table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
        ctx.register_table("users", Arc::new(table)).unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_unknown_types_are_skipped() {
        let ctx = users_context().await;
        let mut expectations = suites::null_checks(["id"]);
        expectations.push(ExpectationConfig::from_parts(
            "expect_column_kl_divergence_to_be_less_than",
            Default::default(),
        ));

        let result = run_expectations(
            &ctx,
            &ValidatorConfig::default(),
            "suite",
            "users",
            &expectations,
        )
        .await
        .unwrap();

        assert!(result.success);
        assert_eq!(result.statistics.evaluated_expectations, 1);
    }

    #[tokio::test]
    async fn test_errors_are_caught_into_results() {
        let ctx = users_context().await;
        let expectations = vec![ExpectationConfig::new(ExpectationType::ExpectColumnValuesToBeUnique)
            .with_kwarg("column", json!("missing_column"))];

        let result = run_expectations(
            &ctx,
            &ValidatorConfig::default(),
            "suite",
            "users",
            &expectations,
        )
        .await
        .unwrap();

        assert!(!result.success);
        assert!(result.results[0].exception_info.is_some());
    }

    #[tokio::test]
    async fn test_errors_propagate_without_catch() {
        let ctx = users_context().await;
        let expectations = vec![ExpectationConfig::new(ExpectationType::ExpectColumnValuesToBeUnique)];

        let config = ValidatorConfig::default().with_catch_exceptions(false);
        let result = run_expectations(&ctx, &config, "suite", "users", &expectations).await;
        assert!(matches!(
            result,
            Err(ExpectationsError::InvalidExpectation { .. })
        ));
    }

    #[tokio::test]
    async fn test_one_null_fails_one_expectation() {
        let ctx = users_context().await;
        let expectations = suites::null_checks(["id", "email"]);

        let result = run_expectations(
            &ctx,
            &ValidatorConfig::default(),
            "suite",
            "users",
            &expectations,
        )
        .await
        .unwrap();

        assert!(!result.success);
        assert_eq!(result.statistics.unsuccessful_expectations, 1);
        assert_eq!(result.results[1].result.unexpected_count, Some(1));
    }
}
