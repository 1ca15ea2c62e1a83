//! Constraint trait and the outcome of evaluating one expectation.

use crate::prelude::*;
use async_trait::async_trait;
use datafusion::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

/// Measurements reported for one evaluated expectation.
///
/// Column-map expectations fill in the counts; aggregate expectations report
/// an `observed_value`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservedResult {
    /// Aggregate value the expectation compared against its bounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_value: Option<Value>,
    /// Number of rows examined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_count: Option<u64>,
    /// Number of null values among the examined rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_count: Option<u64>,
    /// Number of values that did not meet the expectation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unexpected_count: Option<u64>,
    /// Unexpected values as a percentage of the values considered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unexpected_percent: Option<f64>,
    /// A sample of unexpected values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partial_unexpected_list: Vec<Value>,
}

impl ObservedResult {
    /// Creates a result carrying only an observed value.
    pub fn observed(value: Value) -> Self {
        Self {
            observed_value: Some(value),
            ..Self::default()
        }
    }
}

/// The result of evaluating a constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationOutcome {
    /// Whether the expectation was met
    pub success: bool,
    /// What was measured
    pub result: ObservedResult,
}

impl ExpectationOutcome {
    /// Creates a successful outcome.
    pub fn success(result: ObservedResult) -> Self {
        Self {
            success: true,
            result,
        }
    }

    /// Creates a failed outcome.
    pub fn failure(result: ObservedResult) -> Self {
        Self {
            success: false,
            result,
        }
    }

    /// Creates an outcome from a boolean.
    pub fn from_bool(success: bool, result: ObservedResult) -> Self {
        Self { success, result }
    }
}

/// An expectation compiled into something that can run against DataFusion.
///
/// The table under validation is read from the task-local
/// [`ValidationContext`](crate::core::ValidationContext), so a constraint
/// can be reused for any table.
#[async_trait]
pub trait Constraint: Debug + Send + Sync {
    /// Evaluates the constraint against the data in the session context.
    async fn evaluate(&self, ctx: &SessionContext) -> Result<ExpectationOutcome>;

    /// Returns the name of the constraint.
    fn name(&self) -> &str;

    /// Returns the column this constraint operates on (if single-column).
    fn column(&self) -> Option<&str> {
        None
    }
}

/// A boxed constraint for use in collections.
pub type BoxedConstraint = Box<dyn Constraint>;
