//! Expectation descriptors.
//!
//! An expectation descriptor is a plain `{expectation_type, kwargs}` mapping.
//! Descriptors are data: they are built by the helpers in [`crate::suites`],
//! loaded from JSON, and only interpreted when a validator evaluates them.

use crate::error::{ExpectationsError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The expectation types understood by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectationType {
    /// Column values are not null
    ExpectColumnValuesToNotBeNull,
    /// Column has the given data type
    ExpectColumnValuesToBeOfType,
    /// Column values lie between bounds
    ExpectColumnValuesToBeBetween,
    /// Column minimum lies between bounds
    ExpectColumnMinToBeBetween,
    /// Column maximum lies between bounds
    ExpectColumnMaxToBeBetween,
    /// Column values are unique
    ExpectColumnValuesToBeUnique,
    /// Column values match a regex
    ExpectColumnValuesToMatchRegex,
    /// Column values belong to a set
    ExpectColumnValuesToBeInSet,
    /// Table row count lies between bounds
    ExpectTableRowCountToBeBetween,
}

impl ExpectationType {
    /// All supported expectation types.
    pub const ALL: [ExpectationType; 9] = [
        ExpectationType::ExpectColumnValuesToNotBeNull,
        ExpectationType::ExpectColumnValuesToBeOfType,
        ExpectationType::ExpectColumnValuesToBeBetween,
        ExpectationType::ExpectColumnMinToBeBetween,
        ExpectationType::ExpectColumnMaxToBeBetween,
        ExpectationType::ExpectColumnValuesToBeUnique,
        ExpectationType::ExpectColumnValuesToMatchRegex,
        ExpectationType::ExpectColumnValuesToBeInSet,
        ExpectationType::ExpectTableRowCountToBeBetween,
    ];

    /// Returns the wire name of this expectation type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExpectColumnValuesToNotBeNull => "expect_column_values_to_not_be_null",
            Self::ExpectColumnValuesToBeOfType => "expect_column_values_to_be_of_type",
            Self::ExpectColumnValuesToBeBetween => "expect_column_values_to_be_between",
            Self::ExpectColumnMinToBeBetween => "expect_column_min_to_be_between",
            Self::ExpectColumnMaxToBeBetween => "expect_column_max_to_be_between",
            Self::ExpectColumnValuesToBeUnique => "expect_column_values_to_be_unique",
            Self::ExpectColumnValuesToMatchRegex => "expect_column_values_to_match_regex",
            Self::ExpectColumnValuesToBeInSet => "expect_column_values_to_be_in_set",
            Self::ExpectTableRowCountToBeBetween => "expect_table_row_count_to_be_between",
        }
    }

    /// Returns true for expectations that look at a single column.
    pub fn is_column_expectation(&self) -> bool {
        !matches!(self, Self::ExpectTableRowCountToBeBetween)
    }
}

impl fmt::Display for ExpectationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpectationType {
    type Err = ExpectationsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                ExpectationsError::NotSupported(format!("Unknown expectation type '{s}'"))
            })
    }
}

/// A single expectation descriptor.
///
/// Serializes to `{"expectation_type": "...", "kwargs": {...}}`.
///
/// # Examples
///
/// ```rust
/// use db_expectations::expectation::{ExpectationConfig, ExpectationType};
/// use serde_json::json;
///
/// let exp = ExpectationConfig::new(ExpectationType::ExpectColumnValuesToNotBeNull)
///     .with_kwarg("column", json!("email"));
/// assert_eq!(exp.expectation_type, "expect_column_values_to_not_be_null");
/// assert_eq!(exp.column(), Some("email"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationConfig {
    /// The wire name of the expectation
    pub expectation_type: String,
    /// Keyword arguments for the expectation
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl ExpectationConfig {
    /// Creates a descriptor of a known type with no kwargs.
    pub fn new(expectation_type: ExpectationType) -> Self {
        Self {
            expectation_type: expectation_type.as_str().to_string(),
            kwargs: Map::new(),
        }
    }

    /// Creates a descriptor from a raw type name and kwargs.
    pub fn from_parts(expectation_type: impl Into<String>, kwargs: Map<String, Value>) -> Self {
        Self {
            expectation_type: expectation_type.into(),
            kwargs,
        }
    }

    /// Adds a keyword argument.
    pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }

    /// Resolves the expectation type, if it is one the evaluator understands.
    pub fn kind(&self) -> Option<ExpectationType> {
        self.expectation_type.parse().ok()
    }

    /// Returns the `column` kwarg, if present and a string.
    pub fn column(&self) -> Option<&str> {
        self.kwargs.get("column").and_then(Value::as_str)
    }

    /// Returns a kwarg by name.
    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }

    /// Returns a required string kwarg.
    pub(crate) fn required_str(&self, key: &str) -> Result<&str> {
        match self.kwargs.get(key) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(self.invalid(format!("'{key}' must be a string, got {other}"))),
            None => Err(self.invalid(format!("missing required kwarg '{key}'"))),
        }
    }

    /// Returns an optional kwarg, treating JSON null as absent.
    pub(crate) fn optional(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key).filter(|v| !v.is_null())
    }

    /// Returns an optional boolean kwarg, defaulting to false.
    pub(crate) fn flag(&self, key: &str) -> Result<bool> {
        match self.optional(key) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(self.invalid(format!("'{key}' must be a boolean, got {other}"))),
        }
    }

    /// Returns the `mostly` fraction, defaulting to 1.0.
    pub(crate) fn mostly(&self) -> Result<f64> {
        match self.optional("mostly") {
            None => Ok(1.0),
            Some(v) => {
                let mostly = v
                    .as_f64()
                    .ok_or_else(|| self.invalid(format!("'mostly' must be a number, got {v}")))?;
                if !(0.0..=1.0).contains(&mostly) {
                    return Err(self.invalid(format!(
                        "'mostly' must be between 0.0 and 1.0, got {mostly}"
                    )));
                }
                Ok(mostly)
            }
        }
    }

    pub(crate) fn invalid(&self, message: impl Into<String>) -> ExpectationsError {
        ExpectationsError::invalid_expectation(self.expectation_type.clone(), message)
    }
}

impl fmt::Display for ExpectationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column() {
            Some(column) => write!(f, "{}({column})", self.expectation_type),
            None => f.write_str(&self.expectation_type),
        }
    }
}
