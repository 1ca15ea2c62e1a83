//! Uniqueness constraint.

use super::column_map::ColumnMapCounts;
use super::{column_values, first_row_value, scalar_to_u64};
use crate::core::{current_validation_context, Constraint, ExpectationOutcome};
use crate::prelude::*;
use crate::security::SqlSecurity;
use async_trait::async_trait;
use datafusion::prelude::*;
use tracing::{debug, instrument};

/// Checks that non-null values of a column are unique.
///
/// Every row whose value occurs more than once is unexpected, so two rows
/// sharing a value count as two unexpected values.
///
/// # Examples
///
/// ```rust
/// use db_expectations::constraints::UniqueConstraint;
/// use db_expectations::core::Constraint;
///
/// let constraint = UniqueConstraint::new("customer_id");
/// assert_eq!(constraint.name(), "unique");
/// ```
#[derive(Debug, Clone)]
pub struct UniqueConstraint {
    column: String,
    mostly: f64,
    partial_unexpected_count: usize,
}

impl UniqueConstraint {
    /// Creates a uniqueness constraint.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            mostly: 1.0,
            partial_unexpected_count: crate::core::DEFAULT_PARTIAL_UNEXPECTED_COUNT,
        }
    }

    /// Sets the fraction of values that must be unique.
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
impl Constraint for UniqueConstraint {
    #[instrument(skip(self, ctx), fields(constraint.name = %self.name(), constraint.column = %self.column))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ExpectationOutcome> {
        let column = SqlSecurity::escape_identifier(&self.column)?;
        let table = current_validation_context().quoted_table()?;
        let duplicated = format!(
            "SELECT {column} FROM {table} WHERE {column} IS NOT NULL \
             GROUP BY {column} HAVING COUNT(*) > 1"
        );

        let sql = format!("SELECT COUNT(*) AS total_count, COUNT({column}) AS non_null_count FROM {table}");
        let batches = ctx.sql(&sql).await?.collect().await?;
        let element_count = scalar_to_u64(&first_row_value(&batches, 0)?)?;
        let non_null_count = scalar_to_u64(&first_row_value(&batches, 1)?)?;

        let sql = format!(
            "SELECT COALESCE(SUM(duplicate_count), 0) AS unexpected_count FROM ( \
                SELECT COUNT(*) AS duplicate_count FROM {table} WHERE {column} IS NOT NULL \
                GROUP BY {column} HAVING COUNT(*) > 1 \
             ) AS duplicates"
        );
        let batches = ctx.sql(&sql).await?.collect().await?;
        let unexpected_count = scalar_to_u64(&first_row_value(&batches, 0)?)?;

        debug!(
            constraint.column = %self.column,
            data.rows = element_count,
            data.duplicated_rows = unexpected_count,
            "Computed duplicate count"
        );

        let partial = if unexpected_count > 0 && self.partial_unexpected_count > 0 {
            let sql = format!(
                "SELECT {column} FROM {table} WHERE {column} IN ({duplicated}) LIMIT {}",
                self.partial_unexpected_count
            );
            column_values(&ctx.sql(&sql).await?.collect().await?)?
        } else {
            Vec::new()
        };

        let counts = ColumnMapCounts {
            element_count,
            missing_count: element_count.saturating_sub(non_null_count),
            unexpected_count,
        };
        Ok(counts.into_outcome(self.mostly, partial))
    }

    fn name(&self) -> &str {
        "unique"
    }

    fn column(&self) -> Option<&str> {
        Some(&self.column)
    }
}
