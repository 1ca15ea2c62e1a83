//! Column data type constraint.

use crate::core::{current_validation_context, Constraint, ExpectationOutcome, ObservedResult};
use crate::prelude::*;
use crate::security::SqlSecurity;
use arrow::datatypes::DataType;
use async_trait::async_trait;
use datafusion::prelude::*;
use serde_json::Value;
use tracing::{debug, instrument};

/// Checks the declared type of a column against an expected type name.
///
/// The expected type is either a common alias or an Arrow type name, compared
/// case-insensitively:
///
/// | Alias | Matches |
/// |---|---|
/// | `int`, `integer`, `int64`, `bigint`, `int32`, `smallint`, `tinyint` | any integer type |
/// | `str`, `string`, `text`, `varchar`, `char` | `Utf8`, `LargeUtf8`, `Utf8View` |
/// | `float`, `double`, `real`, `float64`, `float32` | any floating point type |
/// | `bool`, `boolean` | `Boolean` |
/// | `date` | `Date32`, `Date64` |
/// | `datetime`, `timestamp` | any `Timestamp` |
/// | `decimal`, `numeric` | `Decimal128`, `Decimal256` |
///
/// The observed value is the Arrow name of the column type.
///
/// # Examples
///
/// ```rust
/// use db_expectations::constraints::TypeConstraint;
/// use arrow::datatypes::DataType;
///
/// let constraint = TypeConstraint::new("age", "integer");
/// assert!(constraint.matches(&DataType::Int32));
/// assert!(!constraint.matches(&DataType::Utf8));
/// ```
#[derive(Debug, Clone)]
pub struct TypeConstraint {
    column: String,
    expected: String,
}

impl TypeConstraint {
    /// Creates a type constraint.
    pub fn new(column: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            expected: expected.into(),
        }
    }

    /// Returns true if `data_type` satisfies the expected type name.
    pub fn matches(&self, data_type: &DataType) -> bool {
        let expected = self.expected.trim().to_ascii_lowercase();
        match expected.as_str() {
            "int" | "integer" | "int64" | "bigint" | "int32" | "smallint" | "tinyint" => {
                data_type.is_integer()
            }
            "str" | "string" | "text" | "varchar" | "char" => matches!(
                data_type,
                DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
            ),
            "float" | "double" | "real" | "float64" | "float32" => data_type.is_floating(),
            "bool" | "boolean" => matches!(data_type, DataType::Boolean),
            "date" => matches!(data_type, DataType::Date32 | DataType::Date64),
            "datetime" | "timestamp" => matches!(data_type, DataType::Timestamp(_, _)),
            "decimal" | "numeric" => matches!(
                data_type,
                DataType::Decimal128(_, _) | DataType::Decimal256(_, _)
            ),
            _ => {
                let actual = data_type.to_string().to_ascii_lowercase();
                let base = actual.split('(').next().unwrap_or_default();
                actual == expected || base == expected
            }
        }
    }
}

#[async_trait]
impl Constraint for TypeConstraint {
    #[instrument(skip(self, ctx), fields(constraint.name = %self.name(), constraint.column = %self.column, constraint.expected = %self.expected))]
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ExpectationOutcome> {
        SqlSecurity::validate_identifier(&self.column)?;
        let table = SqlSecurity::table_reference(current_validation_context().table_name())?;

        let df = ctx.table(table).await?;
        let field = df
            .schema()
            .field_with_name(None, &self.column)
            .map_err(|_| ExpectationsError::ColumnNotFound {
                column: self.column.clone(),
            })?;

        let actual = field.data_type();
        let success = self.matches(actual);
        debug!(
            constraint.column = %self.column,
            column.data_type = %actual,
            success,
            "Compared column type"
        );

        Ok(ExpectationOutcome::from_bool(
            success,
            ObservedResult::observed(Value::String(actual.to_string())),
        ))
    }

    fn name(&self) -> &str {
        "type"
    }

    fn column(&self) -> Option<&str> {
        Some(&self.column)
    }
}
