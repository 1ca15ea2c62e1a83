//! Regex pattern constraint.

use super::column_map::ColumnMapQuery;
use crate::core::{Constraint, ExpectationOutcome};
use crate::prelude::*;
use crate::security::SqlSecurity;
use async_trait::async_trait;
use datafusion::prelude::*;
use tracing::instrument;

/// Checks that non-null values of a column match a regular expression.
///
/// The pattern is searched for anywhere in the value; anchor it with `^` and
/// `$` to match whole values. Non-string columns are cast to text first.
///
/// # Examples
///
/// ```rust
/// use db_expectations::constraints::RegexConstraint;
///
/// let constraint = RegexConstraint::new("email", r"^[^@]+@[^@]+\.[a-z]+$").unwrap();
/// assert!(RegexConstraint::new("email", "(unclosed").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct RegexConstraint {
    column: String,
    /// Pattern escaped for use in a SQL string literal
    escaped_pattern: String,
    mostly: f64,
    partial_unexpected_count: usize,
}

impl RegexConstraint {
    /// Creates a regex constraint, rejecting invalid patterns.
    pub fn new(column: impl Into<String>, pattern: &str) -> Result<Self> {
        Ok(Self {
            column: column.into(),
            escaped_pattern: SqlSecurity::validate_regex_pattern(pattern)?,
            mostly: 1.0,
            partial_unexpected_count: crate::core::DEFAULT_PARTIAL_UNEXPECTED_COUNT,
        })
    }

    /// Sets the fraction of values that must match.
    pub fn with_mostly(mut self, mostly: f64) -> Self {
        self.mostly = mostly;
        self
    }

    /// Sets how many unexpected values are reported.
    pub fn with_partial_unexpected_count(mut self, count: usize) -> Self {
        self.partial_unexpected_count = count;
        self
    }
}

#[async_trait]
impl Constraint for RegexConstraint {
    #[instrument(skip(self, ctx), fields(constraint.name = %self.name(), constraint.column = %self.column))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ExpectationOutcome> {
        let column = SqlSecurity::escape_identifier(&self.column)?;
        ColumnMapQuery {
            column: &self.column,
            expected: format!("CAST({column} AS VARCHAR) ~ '{}'", self.escaped_pattern),
            mostly: self.mostly,
            partial_unexpected_count: self.partial_unexpected_count,
        }
        .evaluate(ctx)
        .await
    }

    fn name(&self) -> &str {
        "match_regex"
    }

    fn column(&self) -> Option<&str> {
        Some(&self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::single_column_context;
    use arrow::array::StringArray;
    use serde_json::json;
    use std::sync::Arc;

    fn emails(values: Vec<Option<&str>>) -> SessionContext {
        single_column_context("email", Arc::new(StringArray::from(values)))
    }

    #[tokio::test]
    async fn test_all_match() {
        let ctx = emails(vec![Some("a@example.com"), None, Some("b@example.org")]);
        let constraint = RegexConstraint::new("email", r"^[^@]+@[^@]+\.[a-z]+$").unwrap();
        let outcome = constraint.evaluate(&ctx).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.result.missing_count, Some(1));
    }

    #[tokio::test]
    async fn test_reports_unexpected_values() {
        let ctx = emails(vec![Some("a@example.com"), Some("not-an-email")]);
        let constraint = RegexConstraint::new("email", r"^[^@]+@[^@]+\.[a-z]+$").unwrap();
        let outcome = constraint.evaluate(&ctx).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.result.unexpected_count, Some(1));
        assert_eq!(outcome.result.unexpected_percent, Some(50.0));
        assert_eq!(
            outcome.result.partial_unexpected_list,
            vec![json!("not-an-email")]
        );
    }

    #[tokio::test]
    async fn test_pattern_with_quote() {
        let ctx = emails(vec![Some("o'brien"), Some("smith")]);
        let constraint = RegexConstraint::new("email", "'").unwrap();
        let outcome = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(outcome.result.unexpected_count, Some(1));
    }

    #[tokio::test]
    async fn test_partial_list_is_capped() {
        let ctx = emails(vec![Some("x"), Some("y"), Some("z")]);
        let constraint = RegexConstraint::new("email", "@")
            .unwrap()
            .with_partial_unexpected_count(2);
        let outcome = constraint.evaluate(&ctx).await.unwrap();
        assert_eq!(outcome.result.unexpected_count, Some(3));
        assert_eq!(outcome.result.partial_unexpected_list.len(), 2);
    }
}
