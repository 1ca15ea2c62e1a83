//! Set membership constraint.

use super::column_map::ColumnMapQuery;
use crate::core::{Constraint, ExpectationOutcome};
use crate::prelude::*;
use crate::security::SqlSecurity;
use async_trait::async_trait;
use datafusion::prelude::*;
use serde_json::Value;
use tracing::instrument;

/// Checks that non-null values of a column belong to a fixed set.
///
/// Set members must be scalars (numbers, strings or booleans). An empty set
/// makes every non-null value unexpected.
#[derive(Debug, Clone)]
pub struct InSetConstraint {
    column: String,
    value_set: Vec<Value>,
    mostly: f64,
    partial_unexpected_count: usize,
}

impl InSetConstraint {
    /// Creates a set membership constraint.
    pub fn new(column: impl Into<String>, value_set: Vec<Value>) -> Self {
        Self {
            column: column.into(),
            value_set,
            mostly: 1.0,
            partial_unexpected_count: crate::core::DEFAULT_PARTIAL_UNEXPECTED_COUNT,
        }
    }

    /// Sets the fraction of values that must belong to the set.
    pub fn with_mostly(mut self, mostly: f64) -> Self {
        self.mostly = mostly;
        self
    }

    /// Sets how many unexpected values are reported.
    pub fn with_partial_unexpected_count(mut self, count: usize) -> Self {
        self.partial_unexpected_count = count;
        self
    }

    fn predicate(&self, column: &str) -> Result<String> {
        let members = self
            .value_set
            .iter()
            .filter(|v| !v.is_null())
            .map(SqlSecurity::json_literal)
            .collect::<Result<Vec<_>>>()?;

        if members.is_empty() {
            Ok("FALSE".to_string())
        } else {
            Ok(format!("{column} IN ({})", members.join(", ")))
        }
    }
}

#[async_trait]
impl Constraint for InSetConstraint {
    #[instrument(skip(self, ctx), fields(constraint.name = %self.name(), constraint.column = %self.column, constraint.set_size = self.value_set.len()))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ExpectationOutcome> {
        let column = SqlSecurity::escape_identifier(&self.column)?;
        ColumnMapQuery {
            column: &self.column,
            expected: self.predicate(&column)?,
            mostly: self.mostly,
            partial_unexpected_count: self.partial_unexpected_count,
        }
        .evaluate(ctx)
        .await
    }

    fn name(&self) -> &str {
        "in_set"
    }

    fn column(&self) -> Option<&str> {
        Some(&self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::single_column_context;
    use arrow::array::{Int64Array, StringArray};
    use serde_json::json;
    use std::sync::Arc;

    fn statuses(values: Vec<Option<&str>>) -> SessionContext {
        single_column_context("status", Arc::new(StringArray::from(values)))
    }

    #[test]
    fn test_predicate() {
        let constraint = InSetConstraint::new("status", vec![json!("a"), json!("it's")]);
        assert_eq!(
            constraint.predicate("\"status\"").unwrap(),
            "\"status\" IN ('a', 'it''s')"
        );
        assert_eq!(
            InSetConstraint::new("status", vec![]).predicate("s").unwrap(),
            "FALSE"
        );
        assert!(InSetConstraint::new("status", vec![json!([1])])
            .predicate("s")
            .is_err());
    }

    #[tokio::test]
    async fn test_all_in_set() {
        let ctx = statuses(vec![Some("active"), None, Some("inactive")]);
        let constraint =
            InSetConstraint::new("status", vec![json!("active"), json!("inactive")]);
        assert!(constraint.evaluate(&ctx).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_value_outside_set() {
        let ctx = statuses(vec![Some("active"), Some("deleted"), Some("deleted")]);
        let constraint =
            InSetConstraint::new("status", vec![json!("active"), json!("inactive")]);
        let outcome = constraint.evaluate(&ctx).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.result.unexpected_count, Some(2));
        assert_eq!(
            outcome.result.partial_unexpected_list,
            vec![json!("deleted"), json!("deleted")]
        );
    }

    #[tokio::test]
    async fn test_empty_set_rejects_values() {
        let ctx = statuses(vec![Some("active")]);
        let outcome = InSetConstraint::new("status", vec![])
            .evaluate(&ctx)
            .await
            .unwrap();
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_numeric_set() {
        let ctx = single_column_context("code", Arc::new(Int64Array::from(vec![1, 2, 3])));
        let constraint = InSetConstraint::new("code", vec![json!(1), json!(2), json!(3)]);
        assert!(constraint.evaluate(&ctx).await.unwrap().success);
    }
}
