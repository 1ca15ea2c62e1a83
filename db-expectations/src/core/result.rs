//! Validation result types.

use super::ObservedResult;
use crate::expectation::ExpectationConfig;
use serde::{Deserialize, Serialize};

/// Details of an error raised while evaluating one expectation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    /// Always true when present
    pub raised_exception: bool,
    /// The error message
    pub exception_message: String,
}

/// The result of one expectation within a validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationResult {
    /// The descriptor that was evaluated
    pub expectation_config: ExpectationConfig,
    /// Whether the expectation was met
    pub success: bool,
    /// What was measured
    pub result: ObservedResult,
    /// Set when evaluation raised instead of producing a measurement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_info: Option<ExceptionInfo>,
}

impl ExpectationResult {
    /// Creates a result for an expectation whose evaluation raised.
    pub fn from_exception(expectation_config: ExpectationConfig, message: impl Into<String>) -> Self {
        Self {
            expectation_config,
            success: false,
            result: ObservedResult::default(),
            exception_info: Some(ExceptionInfo {
                raised_exception: true,
                exception_message: message.into(),
            }),
        }
    }
}

/// Summary counts for a validation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationStatistics {
    /// Number of expectations evaluated
    pub evaluated_expectations: usize,
    /// Number of expectations that succeeded
    pub successful_expectations: usize,
    /// Number of expectations that failed or raised
    pub unsuccessful_expectations: usize,
    /// Successful expectations as a percentage; `None` when nothing was evaluated
    pub success_percent: Option<f64>,
}

impl ValidationStatistics {
    /// Computes statistics from per-expectation results.
    pub fn from_results(results: &[ExpectationResult]) -> Self {
        let evaluated = results.len();
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            evaluated_expectations: evaluated,
            successful_expectations: successful,
            unsuccessful_expectations: evaluated - successful,
            success_percent: if evaluated == 0 {
                None
            } else {
                Some(successful as f64 / evaluated as f64 * 100.0)
            },
        }
    }
}

/// The result of validating one table or query against a list of expectations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// True iff every evaluated expectation succeeded
    pub success: bool,
    /// Name of the suite that was run
    pub suite_name: String,
    /// Name of the table or query asset that was validated
    pub asset_name: String,
    /// Summary counts
    pub statistics: ValidationStatistics,
    /// Per-expectation results, in evaluation order
    pub results: Vec<ExpectationResult>,
    /// When the validation finished (RFC 3339)
    pub evaluated_at: String,
}

impl ValidationResult {
    /// Builds a result, deriving the success flag and statistics.
    pub fn new(
        suite_name: impl Into<String>,
        asset_name: impl Into<String>,
        results: Vec<ExpectationResult>,
    ) -> Self {
        let statistics = ValidationStatistics::from_results(&results);
        Self {
            success: statistics.unsuccessful_expectations == 0,
            suite_name: suite_name.into(),
            asset_name: asset_name.into(),
            statistics,
            results,
            evaluated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Returns true if the validation succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Returns the expectations that failed or raised.
    pub fn failed_expectations(&self) -> impl Iterator<Item = &ExpectationResult> {
        self.results.iter().filter(|r| !r.success)
    }

    /// Formats the validation result as compact JSON.
    pub fn to_json(&self) -> crate::prelude::Result<String> {
        use crate::formatters::{JsonFormatter, ResultFormatter};
        JsonFormatter::new().with_pretty(false).format(self)
    }

    /// Formats the validation result as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> crate::prelude::Result<String> {
        use crate::formatters::{JsonFormatter, ResultFormatter};
        JsonFormatter::new().format(self)
    }

    /// Formats the validation result for console display.
    pub fn to_human(&self) -> crate::prelude::Result<String> {
        use crate::formatters::{HumanFormatter, ResultFormatter};
        HumanFormatter::new().format(self)
    }
}
