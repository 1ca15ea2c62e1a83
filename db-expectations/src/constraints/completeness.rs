//! Not-null constraint.

use super::{first_row_value, meets_mostly, percent, scalar_to_u64};
use crate::core::{current_validation_context, Constraint, ExpectationOutcome, ObservedResult};
use crate::prelude::*;
use crate::security::SqlSecurity;
use async_trait::async_trait;
use datafusion::prelude::*;
use tracing::{debug, instrument};

/// Checks that a column has no nulls, or at most `1 - mostly` of them.
///
/// Unlike the other column checks, nulls are measured against every row.
///
/// # Examples
///
/// ```rust
/// use db_expectations::constraints::NotNullConstraint;
/// use db_expectations::core::Constraint;
///
/// let constraint = NotNullConstraint::new("email", 0.95);
/// assert_eq!(constraint.column(), Some("email"));
/// ```
#[derive(Debug, Clone)]
pub struct NotNullConstraint {
    column: String,
    mostly: f64,
}

impl NotNullConstraint {
    /// Creates a not-null constraint for `column`.
    pub fn new(column: impl Into<String>, mostly: f64) -> Self {
        Self {
            column: column.into(),
            mostly,
        }
    }
}

#[async_trait]
impl Constraint for NotNullConstraint {
    #[instrument(skip(self, ctx), fields(constraint.name = %self.name(), constraint.column = %self.column, constraint.mostly = %self.mostly))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ExpectationOutcome> {
        let column = SqlSecurity::escape_identifier(&self.column)?;
        let table = current_validation_context().quoted_table()?;

        let sql = format!(
            "SELECT COUNT(*) AS total_count, COUNT({column}) AS non_null_count FROM {table}"
        );
        let batches = ctx.sql(&sql).await?.collect().await?;

        let total = scalar_to_u64(&first_row_value(&batches, 0)?)?;
        let non_null = scalar_to_u64(&first_row_value(&batches, 1)?)?;
        let nulls = total.saturating_sub(non_null);

        debug!(
            constraint.column = %self.column,
            data.rows = total,
            data.nulls = nulls,
            "Computed null count"
        );

        Ok(ExpectationOutcome::from_bool(
            meets_mostly(nulls, total, self.mostly),
            ObservedResult {
                element_count: Some(total),
                missing_count: Some(nulls),
                unexpected_count: Some(nulls),
                unexpected_percent: Some(percent(nulls, total).unwrap_or(0.0)),
                ..ObservedResult::default()
            },
        ))
    }

    fn name(&self) -> &str {
        "not_null"
    }

    fn column(&self) -> Option<&str> {
        Some(&self.column)
    }
}
