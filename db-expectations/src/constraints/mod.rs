//! Built-in evaluators for expectation descriptors.
//!
//! Every supported [`ExpectationType`] compiles into one [`Constraint`]
//! implementation that evaluates with a DataFusion SQL aggregate:
//!
//! | Expectation type | Constraint |
//! |---|---|
//! | `expect_column_values_to_not_be_null` | [`NotNullConstraint`] |
//! | `expect_column_values_to_be_of_type` | [`TypeConstraint`] |
//! | `expect_column_values_to_be_between` | [`ValuesBetweenConstraint`] |
//! | `expect_column_min_to_be_between` / `expect_column_max_to_be_between` | [`ColumnAggregateConstraint`] |
//! | `expect_column_values_to_be_unique` | [`UniqueConstraint`] |
//! | `expect_column_values_to_match_regex` | [`RegexConstraint`] |
//! | `expect_column_values_to_be_in_set` | [`InSetConstraint`] |
//! | `expect_table_row_count_to_be_between` | [`RowCountConstraint`] |
//!
//! Column-map expectations (every per-value check except not-null) ignore
//! null values, in line with how the descriptors are interpreted elsewhere.

mod column_map;
mod completeness;
mod datatype;
mod pattern;
mod range;
mod size;
mod uniqueness;
mod values;

pub use completeness::NotNullConstraint;
pub use datatype::TypeConstraint;
pub use pattern::RegexConstraint;
pub use range::{AggregateKind, Bounds, ColumnAggregateConstraint, ValuesBetweenConstraint};
pub use size::RowCountConstraint;
pub use uniqueness::UniqueConstraint;
pub use values::InSetConstraint;

use crate::core::{BoxedConstraint, ValidatorConfig};
use crate::expectation::{ExpectationConfig, ExpectationType};
use crate::prelude::*;
use arrow::record_batch::RecordBatch;
use datafusion::scalar::ScalarValue;
use serde_json::Value;

/// Compiles a descriptor of a known type into a constraint.
///
/// Fails with [`ExpectationsError::InvalidExpectation`] when the kwargs do
/// not fit the type.
pub fn build_constraint(
    expectation: &ExpectationConfig,
    kind: ExpectationType,
    config: &ValidatorConfig,
) -> Result<BoxedConstraint> {
    let partial = config.partial_unexpected_count;
    let constraint: BoxedConstraint = match kind {
        ExpectationType::ExpectColumnValuesToNotBeNull => Box::new(NotNullConstraint::new(
            expectation.required_str("column")?,
            expectation.mostly()?,
        )),
        ExpectationType::ExpectColumnValuesToBeOfType => Box::new(TypeConstraint::new(
            expectation.required_str("column")?,
            expectation.required_str("type_")?,
        )),
        ExpectationType::ExpectColumnValuesToBeBetween => {
            let bounds = Bounds::from_expectation(expectation)?;
            if bounds.is_unbounded() {
                return Err(expectation.invalid("min_value and max_value cannot both be null"));
            }
            Box::new(
                ValuesBetweenConstraint::new(expectation.required_str("column")?, bounds)
                    .with_mostly(expectation.mostly()?)
                    .with_parse_datetimes(expectation.flag("parse_strings_as_datetimes")?)
                    .with_partial_unexpected_count(partial),
            )
        }
        ExpectationType::ExpectColumnMinToBeBetween => Box::new(ColumnAggregateConstraint::new(
            AggregateKind::Min,
            expectation.required_str("column")?,
            Bounds::from_expectation(expectation)?,
        )),
        ExpectationType::ExpectColumnMaxToBeBetween => Box::new(ColumnAggregateConstraint::new(
            AggregateKind::Max,
            expectation.required_str("column")?,
            Bounds::from_expectation(expectation)?,
        )),
        ExpectationType::ExpectColumnValuesToBeUnique => Box::new(
            UniqueConstraint::new(expectation.required_str("column")?)
                .with_mostly(expectation.mostly()?)
                .with_partial_unexpected_count(partial),
        ),
        ExpectationType::ExpectColumnValuesToMatchRegex => Box::new(
            RegexConstraint::new(
                expectation.required_str("column")?,
                expectation.required_str("regex")?,
            )?
            .with_mostly(expectation.mostly()?)
            .with_partial_unexpected_count(partial),
        ),
        ExpectationType::ExpectColumnValuesToBeInSet => {
            let value_set = match expectation.kwarg("value_set") {
                Some(Value::Array(values)) => values.clone(),
                Some(other) => {
                    return Err(expectation.invalid(format!(
                        "'value_set' must be a list, got {other}"
                    )))
                }
                None => return Err(expectation.invalid("missing required kwarg 'value_set'")),
            };
            Box::new(
                InSetConstraint::new(expectation.required_str("column")?, value_set)
                    .with_mostly(expectation.mostly()?)
                    .with_partial_unexpected_count(partial),
            )
        }
        ExpectationType::ExpectTableRowCountToBeBetween => Box::new(RowCountConstraint::new(
            Bounds::from_expectation(expectation)?,
        )),
    };
    Ok(constraint)
}

/// Returns the value in `column` of the first row of a query result.
pub(crate) fn first_row_value(batches: &[RecordBatch], column: usize) -> Result<ScalarValue> {
    let batch = batches
        .iter()
        .find(|b| b.num_rows() > 0)
        .ok_or_else(|| ExpectationsError::Internal("Query returned no rows".to_string()))?;
    Ok(ScalarValue::try_from_array(batch.column(column), 0)?)
}

/// Reads a non-negative count, treating null as zero.
pub(crate) fn scalar_to_u64(value: &ScalarValue) -> Result<u64> {
    let count = match value {
        ScalarValue::Int64(v) => v.map(|n| n.max(0) as u64),
        ScalarValue::Int32(v) => v.map(|n| n.max(0) as u64),
        ScalarValue::UInt64(v) => *v,
        ScalarValue::UInt32(v) => v.map(u64::from),
        ScalarValue::Null => None,
        other => {
            return Err(ExpectationsError::Internal(format!(
                "Expected an integer count, got {other:?}"
            )))
        }
    };
    Ok(count.unwrap_or(0))
}

/// Converts a scalar produced by a query into a JSON value for reporting.
pub(crate) fn scalar_to_json(value: &ScalarValue) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match value {
        ScalarValue::Boolean(Some(b)) => Value::Bool(*b),
        ScalarValue::Int8(Some(n)) => Value::from(*n),
        ScalarValue::Int16(Some(n)) => Value::from(*n),
        ScalarValue::Int32(Some(n)) => Value::from(*n),
        ScalarValue::Int64(Some(n)) => Value::from(*n),
        ScalarValue::UInt8(Some(n)) => Value::from(*n),
        ScalarValue::UInt16(Some(n)) => Value::from(*n),
        ScalarValue::UInt32(Some(n)) => Value::from(*n),
        ScalarValue::UInt64(Some(n)) => Value::from(*n),
        ScalarValue::Float32(Some(f)) => serde_json::Number::from_f64(f64::from(*f))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ScalarValue::Float64(Some(f)) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ScalarValue::Utf8(Some(s))
        | ScalarValue::LargeUtf8(Some(s))
        | ScalarValue::Utf8View(Some(s)) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    }
}

/// Collects the values of the first column of a query result.
pub(crate) fn column_values(batches: &[RecordBatch]) -> Result<Vec<Value>> {
    let mut values = Vec::new();
    for batch in batches {
        if batch.num_columns() == 0 {
            continue;
        }
        let array = batch.column(0);
        for row in 0..batch.num_rows() {
            values.push(scalar_to_json(&ScalarValue::try_from_array(array, row)?));
        }
    }
    Ok(values)
}

/// Returns `part / whole * 100`, or `None` when `whole` is zero.
pub(crate) fn percent(part: u64, whole: u64) -> Option<f64> {
    if whole == 0 {
        None
    } else {
        Some(part as f64 / whole as f64 * 100.0)
    }
}

/// Applies the `mostly` rule: the fraction of expected values must reach `mostly`.
///
/// Vacuously true when nothing was considered.
pub(crate) fn meets_mostly(unexpected: u64, considered: u64, mostly: f64) -> bool {
    if considered == 0 {
        return true;
    }
    let expected = considered.saturating_sub(unexpected);
    expected as f64 / considered as f64 >= mostly
}
