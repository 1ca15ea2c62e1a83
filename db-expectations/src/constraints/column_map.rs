//! Shared evaluation for per-value expectations.

use super::{column_values, first_row_value, meets_mostly, percent, scalar_to_u64};
use crate::core::{current_validation_context, ExpectationOutcome, ObservedResult};
use crate::prelude::*;
use crate::security::SqlSecurity;
use datafusion::prelude::*;
use serde_json::Value;
use tracing::debug;

/// Row counts gathered for a column-map expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ColumnMapCounts {
    pub element_count: u64,
    pub missing_count: u64,
    pub unexpected_count: u64,
}

impl ColumnMapCounts {
    fn non_null(&self) -> u64 {
        self.element_count.saturating_sub(self.missing_count)
    }

    /// Builds the outcome; unexpected values are measured against non-null rows.
    pub fn into_outcome(self, mostly: f64, partial_unexpected_list: Vec<Value>) -> ExpectationOutcome {
        let non_null = self.non_null();
        let success = meets_mostly(self.unexpected_count, non_null, mostly);
        ExpectationOutcome::from_bool(
            success,
            ObservedResult {
                observed_value: None,
                element_count: Some(self.element_count),
                missing_count: Some(self.missing_count),
                unexpected_count: Some(self.unexpected_count),
                unexpected_percent: Some(percent(self.unexpected_count, non_null).unwrap_or(0.0)),
                partial_unexpected_list,
            },
        )
    }
}

/// A per-value check expressed as a SQL predicate over one column.
///
/// `expected` is the condition a non-null value must satisfy; a predicate
/// that evaluates to null counts as unexpected.
#[derive(Debug, Clone)]
pub(crate) struct ColumnMapQuery<'a> {
    pub column: &'a str,
    pub expected: String,
    pub mostly: f64,
    pub partial_unexpected_count: usize,
}

impl ColumnMapQuery<'_> {
    pub async fn evaluate(&self, ctx: &SessionContext) -> Result<ExpectationOutcome> {
        let column = SqlSecurity::escape_identifier(self.column)?;
        let table = current_validation_context().quoted_table()?;
        let unexpected = format!(
            "{column} IS NOT NULL AND NOT COALESCE(({expected}), FALSE)",
            expected = self.expected
        );

        let sql = format!(
            "SELECT COUNT(*) AS element_count, \
                    COUNT({column}) AS non_null_count, \
                    COALESCE(SUM(CASE WHEN {unexpected} THEN 1 ELSE 0 END), 0) AS unexpected_count \
             FROM {table}"
        );
        debug!(sql = %crate::logging::truncate_field(&sql, 512), "Evaluating column map");

        let batches = ctx.sql(&sql).await?.collect().await?;
        let element_count = scalar_to_u64(&first_row_value(&batches, 0)?)?;
        let non_null_count = scalar_to_u64(&first_row_value(&batches, 1)?)?;
        let counts = ColumnMapCounts {
            element_count,
            missing_count: element_count.saturating_sub(non_null_count),
            unexpected_count: scalar_to_u64(&first_row_value(&batches, 2)?)?,
        };

        let partial = if counts.unexpected_count > 0 && self.partial_unexpected_count > 0 {
            let sql = format!(
                "SELECT {column} FROM {table} WHERE {unexpected} LIMIT {}",
                self.partial_unexpected_count
            );
            column_values(&ctx.sql(&sql).await?.collect().await?)?
        } else {
            Vec::new()
        };

        Ok(counts.into_outcome(self.mostly, partial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_ignore_nulls() {
        let counts = ColumnMapCounts {
            element_count: 10,
            missing_count: 2,
            unexpected_count: 2,
        };
        let outcome = counts.into_outcome(0.75, Vec::new());
        assert!(outcome.success);
        assert_eq!(outcome.result.unexpected_percent, Some(25.0));
        assert_eq!(outcome.result.missing_count, Some(2));

        let outcome = counts.into_outcome(0.8, Vec::new());
        assert!(!outcome.success);
    }

    #[test]
    fn test_all_null_column_is_vacuously_true() {
        let counts = ColumnMapCounts {
            element_count: 3,
            missing_count: 3,
            unexpected_count: 0,
        };
        let outcome = counts.into_outcome(1.0, Vec::new());
        assert!(outcome.success);
        assert_eq!(outcome.result.unexpected_percent, Some(0.0));
    }
}
