//! Row count constraint.

use super::range::Bounds;
use super::{first_row_value, scalar_to_u64};
use crate::core::{current_validation_context, Constraint, ExpectationOutcome, ObservedResult};
use crate::prelude::*;
use async_trait::async_trait;
use datafusion::prelude::*;
use serde_json::Value;
use tracing::{debug, instrument};

/// Checks that the number of rows lies within bounds.
///
/// # Examples
///
/// ```rust
/// use db_expectations::constraints::{Bounds, RowCountConstraint};
/// use db_expectations::core::Constraint;
/// use serde_json::json;
///
/// let constraint = RowCountConstraint::new(Bounds::new(Some(json!(1)), None));
/// assert_eq!(constraint.name(), "row_count");
/// ```
#[derive(Debug, Clone)]
pub struct RowCountConstraint {
    bounds: Bounds,
}

impl RowCountConstraint {
    /// Creates a row count constraint.
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds }
    }
}

#[async_trait]
impl Constraint for RowCountConstraint {
    #[instrument(skip(self, ctx), fields(constraint.name = %self.name(), constraint.bounds = %self.bounds))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ExpectationOutcome> {
        let table = current_validation_context().quoted_table()?;
        let sql = format!("SELECT COUNT(*) AS row_count FROM {table}");

        let batches = ctx.sql(&sql).await?.collect().await?;
        let row_count = scalar_to_u64(&first_row_value(&batches, 0)?)?;
        let success = self.bounds.contains(row_count as f64)?;

        debug!(data.rows = row_count, success, "Compared row count");

        Ok(ExpectationOutcome::from_bool(
            success,
            ObservedResult::observed(Value::from(row_count)),
        ))
    }

    fn name(&self) -> &str {
        "row_count"
    }
}
