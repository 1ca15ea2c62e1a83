//! Pre-built expectation suites for common database validation scenarios.
//!
//! Every builder is a pure function from simple parameters (column lists,
//! column to range/regex/set mappings) to a list of
//! [`ExpectationConfig`] descriptors. Builders preserve the iteration order
//! of their input, so pass an ordered collection (a `Vec` of pairs, an
//! `IndexMap`, a `BTreeMap`) when order matters.
//!
//! # Examples
//!
//! ```rust
//! use db_expectations::suites::{self, ColumnRange};
//!
//! let expectations = suites::combine([
//!     suites::null_checks(["id", "email"]),
//!     suites::unique_checks(["email"]),
//!     suites::range_checks([("age", ColumnRange::between(0, 120))]),
//!     suites::row_count_check(1, Some(10_000)),
//! ]);
//! assert_eq!(expectations.len(), 5);
//! ```

use crate::error::{ExpectationsError, Result};
use crate::expectation::{ExpectationConfig, ExpectationType};
use crate::security::{InputValidator, SqlSecurity};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{debug, instrument};

/// Format used for freshness cutoffs.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default threshold for [`completeness_check`].
pub const DEFAULT_COMPLETENESS_THRESHOLD: f64 = 0.95;

/// Bounds for a numeric (or otherwise ordered) column.
///
/// A missing bound is unbounded. A range with neither bound produces no
/// expectation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnRange {
    /// Inclusive lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    /// Inclusive upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
}

impl ColumnRange {
    /// Both bounds.
    pub fn between(min: impl Into<Value>, max: impl Into<Value>) -> Self {
        Self {
            min: Some(min.into()),
            max: Some(max.into()),
        }
    }

    /// Lower bound only.
    pub fn at_least(min: impl Into<Value>) -> Self {
        Self {
            min: Some(min.into()),
            max: None,
        }
    }

    /// Upper bound only.
    pub fn at_most(max: impl Into<Value>) -> Self {
        Self {
            min: None,
            max: Some(max.into()),
        }
    }
}

fn column_expectation(kind: ExpectationType, column: impl Into<String>) -> ExpectationConfig {
    ExpectationConfig::new(kind).with_kwarg("column", Value::String(column.into()))
}

/// Ensures columns have no null values.
pub fn null_checks<I, S>(columns: I) -> Vec<ExpectationConfig>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    columns
        .into_iter()
        .map(|col| column_expectation(ExpectationType::ExpectColumnValuesToNotBeNull, col))
        .collect()
}

/// Validates column data types.
///
/// Type names are resolved when the expectation is evaluated; see
/// [`crate::constraints::TypeConstraint`] for the accepted aliases.
pub fn type_checks<I, K, T>(column_types: I) -> Vec<ExpectationConfig>
where
    I: IntoIterator<Item = (K, T)>,
    K: Into<String>,
    T: Into<String>,
{
    column_types
        .into_iter()
        .map(|(col, dtype)| {
            column_expectation(ExpectationType::ExpectColumnValuesToBeOfType, col)
                .with_kwarg("type_", Value::String(dtype.into()))
        })
        .collect()
}

/// Validates values are within expected ranges.
///
/// A column with both bounds checks every value; a column with a single
/// bound checks the column minimum or maximum instead.
pub fn range_checks<I, K>(column_ranges: I) -> Vec<ExpectationConfig>
where
    I: IntoIterator<Item = (K, ColumnRange)>,
    K: Into<String>,
{
    let mut expectations = Vec::new();
    for (column, range) in column_ranges {
        let column = column.into();
        match (range.min, range.max) {
            (Some(min), Some(max)) => expectations.push(
                column_expectation(ExpectationType::ExpectColumnValuesToBeBetween, column)
                    .with_kwarg("min_value", min)
                    .with_kwarg("max_value", max),
            ),
            (Some(min), None) => expectations.push(
                column_expectation(ExpectationType::ExpectColumnMinToBeBetween, column)
                    .with_kwarg("min_value", min)
                    .with_kwarg("max_value", Value::Null),
            ),
            (None, Some(max)) => expectations.push(
                column_expectation(ExpectationType::ExpectColumnMaxToBeBetween, column)
                    .with_kwarg("min_value", Value::Null)
                    .with_kwarg("max_value", max),
            ),
            (None, None) => {
                debug!(column = %column, "Range without bounds produces no expectation");
            }
        }
    }
    expectations
}

/// Ensures columns contain unique values.
pub fn unique_checks<I, S>(columns: I) -> Vec<ExpectationConfig>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    columns
        .into_iter()
        .map(|col| column_expectation(ExpectationType::ExpectColumnValuesToBeUnique, col))
        .collect()
}

/// Validates values match regex patterns.
///
/// Returns an error if any pattern fails to compile.
pub fn format_checks<I, K, P>(column_formats: I) -> Result<Vec<ExpectationConfig>>
where
    I: IntoIterator<Item = (K, P)>,
    K: Into<String>,
    P: Into<String>,
{
    column_formats
        .into_iter()
        .map(|(col, pattern)| {
            let pattern = pattern.into();
            SqlSecurity::validate_regex_pattern(&pattern)?;
            Ok(
                column_expectation(ExpectationType::ExpectColumnValuesToMatchRegex, col)
                    .with_kwarg("regex", Value::String(pattern)),
            )
        })
        .collect()
}

/// Validates values are in allowed sets.
pub fn set_membership_checks<I, K, S, V>(column_sets: I) -> Vec<ExpectationConfig>
where
    I: IntoIterator<Item = (K, S)>,
    K: Into<String>,
    S: IntoIterator<Item = V>,
    V: Into<Value>,
{
    column_sets
        .into_iter()
        .map(|(col, values)| {
            let value_set: Vec<Value> = values.into_iter().map(Into::into).collect();
            column_expectation(ExpectationType::ExpectColumnValuesToBeInSet, col)
                .with_kwarg("value_set", Value::Array(value_set))
        })
        .collect()
}

/// Validates table row count.
pub fn row_count_check(min_rows: u64, max_rows: Option<u64>) -> Vec<ExpectationConfig> {
    vec![
        ExpectationConfig::new(ExpectationType::ExpectTableRowCountToBeBetween)
            .with_kwarg("min_value", json!(min_rows))
            .with_kwarg("max_value", max_rows.map_or(Value::Null, |max| json!(max))),
    ]
}

/// Validates data is recent: every timestamp is at most `max_age_hours` old.
pub fn data_freshness_check(
    timestamp_column: impl Into<String>,
    max_age_hours: u32,
) -> Vec<ExpectationConfig> {
    data_freshness_check_at(timestamp_column, max_age_hours, Local::now().naive_local())
}

/// Same as [`data_freshness_check`] with an explicit reference time.
pub fn data_freshness_check_at(
    timestamp_column: impl Into<String>,
    max_age_hours: u32,
    now: NaiveDateTime,
) -> Vec<ExpectationConfig> {
    let cutoff = now - chrono::Duration::hours(i64::from(max_age_hours));
    vec![
        column_expectation(ExpectationType::ExpectColumnValuesToBeBetween, timestamp_column)
            .with_kwarg(
                "min_value",
                Value::String(cutoff.format(DATETIME_FORMAT).to_string()),
            )
            .with_kwarg("max_value", Value::Null)
            .with_kwarg("parse_strings_as_datetimes", Value::Bool(true)),
    ]
}

/// Validates columns are mostly complete (non-null).
pub fn completeness_check<I, S>(columns: I, threshold: f64) -> Result<Vec<ExpectationConfig>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    InputValidator::validate_fraction(threshold, "threshold")?;
    Ok(columns
        .into_iter()
        .map(|col| {
            column_expectation(ExpectationType::ExpectColumnValuesToNotBeNull, col)
                .with_kwarg("mostly", json!(threshold))
        })
        .collect())
}

/// Combines multiple expectation lists, preserving order.
pub fn combine<I>(suites: I) -> Vec<ExpectationConfig>
where
    I: IntoIterator<Item = Vec<ExpectationConfig>>,
{
    suites.into_iter().flatten().collect()
}

/// A named, ordered collection of expectations.
///
/// Suites can be stored as JSON so that validation rules live alongside
/// pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectationSuite {
    /// Name of the suite
    pub name: String,
    /// The expectations, in evaluation order
    #[serde(default)]
    pub expectations: Vec<ExpectationConfig>,
    /// Free-form metadata
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl ExpectationSuite {
    /// Creates an empty suite.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expectations: Vec::new(),
            meta: Map::new(),
        }
    }

    /// Appends a list of expectations.
    pub fn with_expectations(mut self, expectations: Vec<ExpectationConfig>) -> Self {
        self.expectations.extend(expectations);
        self
    }

    /// Appends one expectation.
    pub fn push(&mut self, expectation: ExpectationConfig) {
        self.expectations.push(expectation);
    }

    /// Number of expectations.
    pub fn len(&self) -> usize {
        self.expectations.len()
    }

    /// Returns true if the suite has no expectations.
    pub fn is_empty(&self) -> bool {
        self.expectations.is_empty()
    }

    /// Parses a suite from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let suite: Self = serde_json::from_str(json)?;
        if suite.name.trim().is_empty() {
            return Err(ExpectationsError::Configuration(
                "Expectation suite name cannot be empty".to_string(),
            ));
        }
        Ok(suite)
    }

    /// Serializes the suite as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads a suite from a JSON file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let suite = Self::from_json(&contents)?;
        debug!(suite.name = %suite.name, suite.expectations = suite.len(), "Loaded expectation suite");
        Ok(suite)
    }

    /// Writes the suite to a JSON file.
    #[instrument(skip_all, fields(path = %path.as_ref().display(), suite.name = %self.name))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }
}

impl IntoIterator for ExpectationSuite {
    type Item = ExpectationConfig;
    type IntoIter = std::vec::IntoIter<ExpectationConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.expectations.into_iter()
    }
}
