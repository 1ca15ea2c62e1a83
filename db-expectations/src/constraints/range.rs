//! Range constraints: per-value bounds and column min/max bounds.

use super::column_map::ColumnMapQuery;
use super::{first_row_value, scalar_to_json};
use crate::core::{current_validation_context, Constraint, ExpectationOutcome, ObservedResult};
use crate::expectation::ExpectationConfig;
use crate::prelude::*;
use crate::security::SqlSecurity;
use arrow::array::{Array, BooleanArray};
use async_trait::async_trait;
use datafusion::prelude::*;
use serde_json::Value;
use std::fmt;
use tracing::{debug, instrument};

/// Lower and upper bounds taken from `min_value` / `max_value`.
///
/// A missing bound is unbounded. Bounds are inclusive unless `strict_min` or
/// `strict_max` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bounds {
    /// Lower bound
    pub min: Option<Value>,
    /// Upper bound
    pub max: Option<Value>,
    /// Exclude values equal to the lower bound
    pub strict_min: bool,
    /// Exclude values equal to the upper bound
    pub strict_max: bool,
}

impl Bounds {
    /// Creates inclusive bounds.
    pub fn new(min: Option<Value>, max: Option<Value>) -> Self {
        Self {
            min,
            max,
            ..Self::default()
        }
    }

    /// Reads the bounds from an expectation's kwargs.
    pub fn from_expectation(expectation: &ExpectationConfig) -> Result<Self> {
        let bound = |key: &str| -> Result<Option<Value>> {
            match expectation.optional(key) {
                None => Ok(None),
                Some(v @ (Value::Number(_) | Value::String(_))) => Ok(Some(v.clone())),
                Some(other) => Err(expectation.invalid(format!(
                    "'{key}' must be a number, a string or null, got {other}"
                ))),
            }
        };
        Ok(Self {
            min: bound("min_value")?,
            max: bound("max_value")?,
            strict_min: expectation.flag("strict_min")?,
            strict_max: expectation.flag("strict_max")?,
        })
    }

    /// Returns true when neither bound is set.
    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Renders the bounds as a SQL condition on `expr`.
    ///
    /// With `as_timestamp`, bound literals are cast to timestamps.
    pub fn sql_condition(&self, expr: &str, as_timestamp: bool) -> Result<String> {
        let literal = |value: &Value| -> Result<String> {
            let literal = SqlSecurity::json_literal(value)?;
            Ok(if as_timestamp {
                format!("CAST({literal} AS TIMESTAMP)")
            } else {
                literal
            })
        };

        let mut conditions = Vec::new();
        if let Some(min) = &self.min {
            let op = if self.strict_min { ">" } else { ">=" };
            conditions.push(format!("{expr} {op} {}", literal(min)?));
        }
        if let Some(max) = &self.max {
            let op = if self.strict_max { "<" } else { "<=" };
            conditions.push(format!("{expr} {op} {}", literal(max)?));
        }

        if conditions.is_empty() {
            Ok("TRUE".to_string())
        } else {
            Ok(conditions.join(" AND "))
        }
    }

    /// Checks a numeric observation against the bounds.
    pub fn contains(&self, observed: f64) -> Result<bool> {
        let numeric = |value: &Value| {
            value.as_f64().ok_or_else(|| {
                ExpectationsError::invalid_expectation(
                    "range",
                    format!("bound {value} is not numeric"),
                )
            })
        };
        if let Some(min) = &self.min {
            let min = numeric(min)?;
            if observed < min || (self.strict_min && observed == min) {
                return Ok(false);
            }
        }
        if let Some(max) = &self.max {
            let max = numeric(max)?;
            if observed > max || (self.strict_max && observed == max) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.strict_min { '(' } else { '[' };
        let close = if self.strict_max { ')' } else { ']' };
        let show = |v: &Option<Value>| v.as_ref().map_or("-inf/inf".to_string(), Value::to_string);
        write!(f, "{open}{}, {}{close}", show(&self.min), show(&self.max))
    }
}

/// Checks that every non-null value of a column lies within bounds.
///
/// # Examples
///
/// ```rust
/// use db_expectations::constraints::{Bounds, ValuesBetweenConstraint};
/// use serde_json::json;
///
/// let constraint = ValuesBetweenConstraint::new("age", Bounds::new(Some(json!(0)), Some(json!(120))))
///     .with_mostly(0.99);
/// ```
#[derive(Debug, Clone)]
pub struct ValuesBetweenConstraint {
    column: String,
    bounds: Bounds,
    mostly: f64,
    parse_datetimes: bool,
    partial_unexpected_count: usize,
}

impl ValuesBetweenConstraint {
    /// Creates a between constraint.
    pub fn new(column: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            column: column.into(),
            bounds,
            mostly: 1.0,
            parse_datetimes: false,
            partial_unexpected_count: crate::core::DEFAULT_PARTIAL_UNEXPECTED_COUNT,
        }
    }

    /// Sets the fraction of values that must be in range.
    pub fn with_mostly(mut self, mostly: f64) -> Self {
        self.mostly = mostly;
        self
    }

    /// Compares values and bounds as timestamps.
    pub fn with_parse_datetimes(mut self, parse_datetimes: bool) -> Self {
        self.parse_datetimes = parse_datetimes;
        self
    }

    /// Sets how many unexpected values are reported.
    pub fn with_partial_unexpected_count(mut self, count: usize) -> Self {
        self.partial_unexpected_count = count;
        self
    }
}

#[async_trait]
impl Constraint for ValuesBetweenConstraint {
    #[instrument(skip(self, ctx), fields(constraint.name = %self.name(), constraint.column = %self.column, constraint.bounds = %self.bounds))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ExpectationOutcome> {
        let column = SqlSecurity::escape_identifier(&self.column)?;
        let value = if self.parse_datetimes {
            format!("TRY_CAST({column} AS TIMESTAMP)")
        } else {
            column
        };

        ColumnMapQuery {
            column: &self.column,
            expected: self.bounds.sql_condition(&value, self.parse_datetimes)?,
            mostly: self.mostly,
            partial_unexpected_count: self.partial_unexpected_count,
        }
        .evaluate(ctx)
        .await
    }

    fn name(&self) -> &str {
        "values_between"
    }

    fn column(&self) -> Option<&str> {
        Some(&self.column)
    }
}

/// Column aggregate compared against bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    /// Column minimum
    Min,
    /// Column maximum
    Max,
}

impl AggregateKind {
    fn sql_function(&self) -> &'static str {
        match self {
            AggregateKind::Min => "MIN",
            AggregateKind::Max => "MAX",
        }
    }
}

/// Checks that the minimum or maximum of a column lies within bounds.
///
/// Fails when the column has no non-null values and a bound is set.
#[derive(Debug, Clone)]
pub struct ColumnAggregateConstraint {
    kind: AggregateKind,
    column: String,
    bounds: Bounds,
}

impl ColumnAggregateConstraint {
    /// Creates an aggregate bounds constraint.
    pub fn new(kind: AggregateKind, column: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            kind,
            column: column.into(),
            bounds,
        }
    }
}

#[async_trait]
impl Constraint for ColumnAggregateConstraint {
    #[instrument(skip(self, ctx), fields(constraint.name = %self.name(), constraint.column = %self.column, constraint.bounds = %self.bounds))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ExpectationOutcome> {
        let column = SqlSecurity::escape_identifier(&self.column)?;
        let table = current_validation_context().quoted_table()?;
        let aggregate = format!("{}({column})", self.kind.sql_function());
        let condition = self.bounds.sql_condition(&aggregate, false)?;

        let sql = format!(
            "SELECT {aggregate} AS observed_value, \
                    CASE WHEN {condition} THEN TRUE ELSE FALSE END AS in_range \
             FROM {table}"
        );
        let batches = ctx.sql(&sql).await?.collect().await?;

        let observed = scalar_to_json(&first_row_value(&batches, 0)?);
        let in_range = batches
            .iter()
            .find(|b| b.num_rows() > 0)
            .and_then(|b| b.column(1).as_any().downcast_ref::<BooleanArray>())
            .map(|array| !array.is_null(0) && array.value(0))
            .ok_or_else(|| {
                ExpectationsError::Internal("Failed to extract range comparison".to_string())
            })?;

        debug!(
            constraint.column = %self.column,
            observed = %observed,
            in_range,
            "Compared column aggregate"
        );

        Ok(ExpectationOutcome::from_bool(
            in_range,
            ObservedResult::observed(observed),
        ))
    }

    fn name(&self) -> &str {
        match self.kind {
            AggregateKind::Min => "min_between",
            AggregateKind::Max => "max_between",
        }
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

    fn ages(values: Vec<Option<i64>>) -> SessionContext {
        single_column_context("age", Arc::new(Int64Array::from(values)))
    }

    #[test]
    fn test_sql_condition() {
        let bounds = Bounds::new(Some(json!(0)), Some(json!(120)));
        assert_eq!(
            bounds.sql_condition("\"age\"", false).unwrap(),
            "\"age\" >= 0 AND \"age\" <= 120"
        );

        let bounds = Bounds {
            min: Some(json!("2024-01-01 00:00:00")),
            max: None,
            strict_min: true,
            strict_max: false,
        };
        assert_eq!(
            bounds.sql_condition("ts", true).unwrap(),
            "ts > CAST('2024-01-01 00:00:00' AS TIMESTAMP)"
        );

        assert_eq!(Bounds::default().sql_condition("x", false).unwrap(), "TRUE");
    }

    #[test]
    fn test_contains() {
        let bounds = Bounds::new(Some(json!(10)), None);
        assert!(bounds.contains(10.0).unwrap());
        assert!(!bounds.contains(9.0).unwrap());

        let strict = Bounds {
            strict_min: true,
            ..bounds
        };
        assert!(!strict.contains(10.0).unwrap());

        let text = Bounds::new(Some(json!("a")), None);
        assert!(matches!(
            text.contains(1.0),
            Err(ExpectationsError::InvalidExpectation { .. })
        ));
    }

    #[test]
    fn test_bounds_from_expectation() {
        let exp = ExpectationConfig::new(crate::expectation::ExpectationType::ExpectColumnValuesToBeBetween)
            .with_kwarg("min_value", json!(1))
            .with_kwarg("max_value", Value::Null)
            .with_kwarg("strict_min", json!(true));
        let bounds = Bounds::from_expectation(&exp).unwrap();
        assert_eq!(bounds.min, Some(json!(1)));
        assert_eq!(bounds.max, None);
        assert!(bounds.strict_min);

        let exp = exp.with_kwarg("max_value", json!([1, 2]));
        assert!(Bounds::from_expectation(&exp).is_err());
    }

    #[tokio::test]
    async fn test_values_between_ignores_nulls() {
        let ctx = ages(vec![Some(5), None, Some(30), Some(130)]);
        let constraint =
            ValuesBetweenConstraint::new("age", Bounds::new(Some(json!(0)), Some(json!(120))));
        let outcome = constraint.evaluate(&ctx).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.result.element_count, Some(4));
        assert_eq!(outcome.result.missing_count, Some(1));
        assert_eq!(outcome.result.unexpected_count, Some(1));
        assert_eq!(outcome.result.partial_unexpected_list, vec![json!(130)]);
    }

    #[tokio::test]
    async fn test_values_between_with_mostly() {
        let ctx = ages(vec![Some(5), Some(10), Some(30), Some(130)]);
        let constraint =
            ValuesBetweenConstraint::new("age", Bounds::new(Some(json!(0)), Some(json!(120))))
                .with_mostly(0.75);
        assert!(constraint.evaluate(&ctx).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_freshness_style_between() {
        let ctx = single_column_context(
            "updated_at",
            Arc::new(StringArray::from(vec![
                Some("2024-03-10 08:00:00"),
                Some("2024-03-01 08:00:00"),
                None,
            ])),
        );
        let constraint = ValuesBetweenConstraint::new(
            "updated_at",
            Bounds::new(Some(json!("2024-03-09 12:00:00")), None),
        )
        .with_parse_datetimes(true);
        let outcome = constraint.evaluate(&ctx).await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.result.unexpected_count, Some(1));
        assert_eq!(
            outcome.result.partial_unexpected_list,
            vec![json!("2024-03-01 08:00:00")]
        );
    }

    #[tokio::test]
    async fn test_min_between() {
        let ctx = ages(vec![Some(18), Some(40), None]);
        let at_least_18 = ColumnAggregateConstraint::new(
            AggregateKind::Min,
            "age",
            Bounds::new(Some(json!(18)), None),
        );
        let outcome = at_least_18.evaluate(&ctx).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.result.observed_value, Some(json!(18)));

        let at_least_21 = ColumnAggregateConstraint::new(
            AggregateKind::Min,
            "age",
            Bounds::new(Some(json!(21)), None),
        );
        assert!(!at_least_21.evaluate(&ctx).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_max_between() {
        let ctx = ages(vec![Some(18), Some(40)]);
        let at_most_40 = ColumnAggregateConstraint::new(
            AggregateKind::Max,
            "age",
            Bounds::new(None, Some(json!(40))),
        );
        let outcome = at_most_40.evaluate(&ctx).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.result.observed_value, Some(json!(40)));

        let below_40 = ColumnAggregateConstraint::new(
            AggregateKind::Max,
            "age",
            Bounds {
                strict_max: true,
                ..Bounds::new(None, Some(json!(40)))
            },
        );
        assert!(!below_40.evaluate(&ctx).await.unwrap().success);
    }

    #[tokio::test]
    async fn test_min_of_empty_column_fails() {
        let ctx = ages(vec![None, None]);
        let constraint = ColumnAggregateConstraint::new(
            AggregateKind::Min,
            "age",
            Bounds::new(Some(json!(0)), None),
        );
        let outcome = constraint.evaluate(&ctx).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.result.observed_value, Some(Value::Null));
    }
}
