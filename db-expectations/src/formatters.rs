//! Result formatting for validation results.
//!
//! # Examples
//!
//! ```rust
//! use db_expectations::core::ValidationResult;
//! use db_expectations::formatters::{HumanFormatter, JsonFormatter, ResultFormatter};
//!
//! let result = ValidationResult::new("users_suite", "users", Vec::new());
//!
//! let json = JsonFormatter::new().with_pretty(false).format(&result).unwrap();
//! assert!(json.contains("\"suite_name\":\"users_suite\""));
//!
//! let text = HumanFormatter::new().format(&result).unwrap();
//! assert!(text.contains("Validation PASSED"));
//! ```

use crate::core::{ExpectationResult, ValidationResult};
use crate::prelude::*;
use std::fmt::{self, Write};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Configuration options for formatting validation results.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include summary statistics
    pub include_statistics: bool,
    /// Include observed values of failed expectations
    pub include_details: bool,
    /// Include passing expectations in the listing
    pub include_passed: bool,
    /// Maximum number of failed expectations to list (`None` for all)
    pub max_failures: Option<usize>,
    /// Whether to use ANSI colours (human formatter)
    pub use_colors: bool,
    /// Whether to include the evaluation timestamp
    pub include_timestamps: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_statistics: true,
            include_details: true,
            include_passed: false,
            max_failures: None,
            use_colors: true,
            include_timestamps: true,
        }
    }
}

impl FormatterConfig {
    /// Creates a minimal configuration showing only the summary.
    pub fn minimal() -> Self {
        Self {
            include_statistics: true,
            include_details: false,
            include_passed: false,
            max_failures: Some(0),
            use_colors: false,
            include_timestamps: false,
        }
    }

    /// Creates a configuration showing everything.
    pub fn detailed() -> Self {
        Self {
            include_statistics: true,
            include_details: true,
            include_passed: true,
            max_failures: None,
            use_colors: true,
            include_timestamps: true,
        }
    }

    /// Creates a configuration suitable for CI logs.
    pub fn ci() -> Self {
        Self {
            include_statistics: true,
            include_details: true,
            include_passed: false,
            max_failures: Some(50),
            use_colors: false,
            include_timestamps: true,
        }
    }

    /// Sets whether to include summary statistics.
    pub fn with_statistics(mut self, include: bool) -> Self {
        self.include_statistics = include;
        self
    }

    /// Sets whether to include observed values.
    pub fn with_details(mut self, include: bool) -> Self {
        self.include_details = include;
        self
    }

    /// Sets whether passing expectations are listed.
    pub fn with_passed(mut self, include: bool) -> Self {
        self.include_passed = include;
        self
    }

    /// Sets the maximum number of failed expectations to list.
    pub fn with_max_failures(mut self, max: Option<usize>) -> Self {
        self.max_failures = max;
        self
    }

    /// Sets whether to use colourised output.
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }
}

/// Formats a [`ValidationResult`] into a string.
///
/// # Examples
///
/// ```rust
/// use db_expectations::core::ValidationResult;
/// use db_expectations::formatters::ResultFormatter;
///
/// struct OneLine;
///
/// impl ResultFormatter for OneLine {
///     fn format(&self, result: &ValidationResult) -> db_expectations::prelude::Result<String> {
///         Ok(format!("{}: {}", result.asset_name, result.success))
///     }
/// }
/// ```
pub trait ResultFormatter {
    /// Formats a validation result.
    fn format(&self, result: &ValidationResult) -> Result<String>;

    /// Formats a validation result with an explicit configuration.
    ///
    /// The default implementation ignores `config`.
    fn format_with_config(
        &self,
        result: &ValidationResult,
        _config: &FormatterConfig,
    ) -> Result<String> {
        self.format(result)
    }
}

/// Formats validation results as JSON.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a pretty-printing JSON formatter.
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::detailed(),
            pretty: true,
        }
    }

    /// Creates a JSON formatter with the given configuration.
    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    /// Sets whether to pretty-print.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFormatter for JsonFormatter {
    fn format(&self, result: &ValidationResult) -> Result<String> {
        self.format_with_config(result, &self.config)
    }

    fn format_with_config(
        &self,
        result: &ValidationResult,
        config: &FormatterConfig,
    ) -> Result<String> {
        let filtered = filter_result(result, config);
        let json = if self.pretty {
            serde_json::to_string_pretty(&filtered)
        } else {
            serde_json::to_string(&filtered)
        };
        json.map_err(|e| {
            ExpectationsError::Internal(format!("Failed to serialize result to JSON: {e}"))
        })
    }
}

/// Formats validation results for console output.
#[derive(Debug, Clone)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    /// Creates a human formatter with the default configuration.
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
        }
    }

    /// Creates a human formatter with the given configuration.
    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFormatter for HumanFormatter {
    fn format(&self, result: &ValidationResult) -> Result<String> {
        self.format_with_config(result, &self.config)
    }

    fn format_with_config(
        &self,
        result: &ValidationResult,
        config: &FormatterConfig,
    ) -> Result<String> {
        let mut output = String::new();
        write_human(&mut output, result, config)
            .map_err(|e| ExpectationsError::Internal(format!("Failed to format result: {e}")))?;
        Ok(output)
    }
}

fn write_human(out: &mut String, result: &ValidationResult, config: &FormatterConfig) -> fmt::Result {
    let (on, off) = match (config.use_colors, result.success) {
        (false, _) => ("", ""),
        (true, true) => (GREEN, RESET),
        (true, false) => (RED, RESET),
    };

    writeln!(out)?;
    if result.success {
        writeln!(out, "✅ {on}Validation PASSED{off}")?;
    } else {
        writeln!(out, "❌ {on}Validation FAILED{off}")?;
    }
    writeln!(out)?;
    writeln!(out, "Suite: {}", result.suite_name)?;
    writeln!(out, "Asset: {}", result.asset_name)?;
    if config.include_timestamps {
        writeln!(out, "Evaluated at: {}", result.evaluated_at)?;
    }

    if config.include_statistics {
        let stats = &result.statistics;
        writeln!(out)?;
        writeln!(out, "📊 Summary Statistics:")?;
        writeln!(out, "   Evaluated: {}", stats.evaluated_expectations)?;
        writeln!(out, "   Successful: {}", stats.successful_expectations)?;
        writeln!(out, "   Unsuccessful: {}", stats.unsuccessful_expectations)?;
        if let Some(percent) = stats.success_percent {
            writeln!(out, "   Success Rate: {percent:.1}%")?;
        }
    }

    let failed: Vec<&ExpectationResult> = result.failed_expectations().collect();
    let shown = config
        .max_failures
        .map_or(failed.len(), |max| max.min(failed.len()));

    if shown > 0 {
        writeln!(out)?;
        writeln!(out, "🔍 Failed Expectations:")?;
        for (i, expectation) in failed.iter().take(shown).enumerate() {
            writeln!(out)?;
            write_expectation(out, i + 1, expectation, config)?;
        }
    }
    if failed.len() > shown {
        writeln!(out)?;
        writeln!(
            out,
            "   ... and {} more failed expectations",
            failed.len() - shown
        )?;
    }

    if config.include_passed {
        let passed: Vec<&ExpectationResult> =
            result.results.iter().filter(|r| r.success).collect();
        if !passed.is_empty() {
            writeln!(out)?;
            writeln!(out, "Passed Expectations:")?;
            for expectation in passed {
                writeln!(out, "   ✅ {}", describe(expectation))?;
            }
        }
    }

    writeln!(out)
}

fn write_expectation(
    out: &mut String,
    index: usize,
    expectation: &ExpectationResult,
    config: &FormatterConfig,
) -> fmt::Result {
    writeln!(out, "   ❌ #{index}: {}", describe(expectation))?;
    if let Some(info) = &expectation.exception_info {
        writeln!(out, "      Exception: {}", info.exception_message)?;
        return Ok(());
    }
    if !config.include_details {
        return Ok(());
    }

    let observed = &expectation.result;
    if let Some(value) = &observed.observed_value {
        writeln!(out, "      Observed: {value}")?;
    }
    if let (Some(unexpected), Some(total)) = (observed.unexpected_count, observed.element_count) {
        write!(out, "      Unexpected: {unexpected} of {total} rows")?;
        match observed.unexpected_percent {
            Some(percent) => writeln!(out, " ({percent:.2}%)")?,
            None => writeln!(out)?,
        }
    }
    if !observed.partial_unexpected_list.is_empty() {
        let values: Vec<String> = observed
            .partial_unexpected_list
            .iter()
            .map(|v| v.to_string())
            .collect();
        writeln!(out, "      Sample: [{}]", values.join(", "))?;
    }
    Ok(())
}

fn describe(expectation: &ExpectationResult) -> String {
    let config = &expectation.expectation_config;
    match config.column() {
        Some(column) => format!("{} (column: {column})", config.expectation_type),
        None => config.expectation_type.clone(),
    }
}

fn filter_result(result: &ValidationResult, config: &FormatterConfig) -> ValidationResult {
    let mut filtered = result.clone();

    if !config.include_passed {
        filtered.results.retain(|r| !r.success);
    }
    if let Some(max) = config.max_failures {
        let mut failures = 0;
        filtered.results.retain(|r| {
            if r.success {
                return true;
            }
            failures += 1;
            failures <= max
        });
    }
    if !config.include_details {
        for r in &mut filtered.results {
            r.result.partial_unexpected_list.clear();
        }
    }
    if !config.include_timestamps {
        filtered.evaluated_at = String::new();
    }

    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ObservedResult;
    use crate::expectation::{ExpectationConfig, ExpectationType};
    use serde_json::json;

    fn create_test_result() -> ValidationResult {
        let not_null = ExpectationConfig::new(ExpectationType::ExpectColumnValuesToNotBeNull)
            .with_kwarg("column", json!("email"));
        let unique = ExpectationConfig::new(ExpectationType::ExpectColumnValuesToBeUnique)
            .with_kwarg("column", json!("id"));
        let row_count = ExpectationConfig::new(ExpectationType::ExpectTableRowCountToBeBetween)
            .with_kwarg("min_value", json!(1));

        ValidationResult::new(
            "users_suite",
            "users_asset_1",
            vec![
                ExpectationResult {
                    expectation_config: not_null,
                    success: false,
                    result: ObservedResult {
                        element_count: Some(10),
                        missing_count: Some(2),
                        unexpected_count: Some(2),
                        unexpected_percent: Some(20.0),
                        ..ObservedResult::default()
                    },
                    exception_info: None,
                },
                ExpectationResult {
                    expectation_config: unique,
                    success: false,
                    result: ObservedResult {
                        element_count: Some(10),
                        unexpected_count: Some(2),
                        unexpected_percent: Some(20.0),
                        partial_unexpected_list: vec![json!(7), json!(7)],
                        ..ObservedResult::default()
                    },
                    exception_info: None,
                },
                ExpectationResult {
                    expectation_config: row_count,
                    success: true,
                    result: ObservedResult::observed(json!(10)),
                    exception_info: None,
                },
            ],
        )
    }

    #[test]
    fn test_formatter_config() {
        let config = FormatterConfig::default();
        assert!(config.include_statistics);
        assert!(config.use_colors);
        assert_eq!(config.max_failures, None);

        let minimal = FormatterConfig::minimal();
        assert!(!minimal.include_details);
        assert!(!minimal.use_colors);

        let ci = FormatterConfig::ci();
        assert!(!ci.use_colors);
        assert_eq!(ci.max_failures, Some(50));
    }

    #[test]
    fn test_json_formatter() {
        let result = create_test_result();

        let pretty = JsonFormatter::new().format(&result).unwrap();
        assert!(pretty.contains("\"suite_name\": \"users_suite\""));
        assert!(pretty.contains("expect_table_row_count_to_be_between"));

        let compact = JsonFormatter::new().with_pretty(false).format(&result).unwrap();
        assert!(!compact.contains('\n'));
        let parsed: ValidationResult = serde_json::from_str(&compact).unwrap();
        assert_eq!(parsed.results.len(), 3);
        assert_eq!(parsed.statistics.unsuccessful_expectations, 2);
    }

    #[test]
    fn test_json_formatter_with_config() {
        let result = create_test_result();
        let config = FormatterConfig::ci().with_max_failures(Some(1)).with_details(false);
        let output = JsonFormatter::new()
            .with_pretty(false)
            .format_with_config(&result, &config)
            .unwrap();

        let parsed: ValidationResult = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert!(!parsed.results[0].success);
        // statistics describe the full run
        assert_eq!(parsed.statistics.evaluated_expectations, 3);
    }

    #[test]
    fn test_human_formatter() {
        let result = create_test_result();
        let output = HumanFormatter::new().format(&result).unwrap();

        assert!(output.contains("Validation FAILED"));
        assert!(output.contains("Suite: users_suite"));
        assert!(output.contains("Unsuccessful: 2"));
        assert!(output.contains("expect_column_values_to_not_be_null (column: email)"));
        assert!(output.contains("Unexpected: 2 of 10 rows (20.00%)"));
        assert!(output.contains("Sample: [7, 7]"));
        assert!(output.contains("\x1b["));

        let plain = HumanFormatter::with_config(FormatterConfig::default().with_colors(false))
            .format(&result)
            .unwrap();
        assert!(!plain.contains("\x1b["));
    }

    #[test]
    fn test_human_formatter_caps_failures() {
        let result = create_test_result();
        let config = FormatterConfig::default()
            .with_colors(false)
            .with_max_failures(Some(1))
            .with_passed(true);
        let output = HumanFormatter::new()
            .format_with_config(&result, &config)
            .unwrap();

        assert!(output.contains("#1: expect_column_values_to_not_be_null"));
        assert!(!output.contains("#2:"));
        assert!(output.contains("... and 1 more failed expectations"));
        assert!(output.contains("✅ expect_table_row_count_to_be_between"));
    }

    #[test]
    fn test_human_formatter_success() {
        let result = ValidationResult::new("empty", "asset", Vec::new());
        let output = HumanFormatter::with_config(FormatterConfig::minimal())
            .format(&result)
            .unwrap();
        assert!(output.contains("Validation PASSED"));
        assert!(!output.contains("Evaluated at"));
    }

    #[test]
    fn test_exception_is_reported() {
        let config = ExpectationConfig::new(ExpectationType::ExpectColumnValuesToMatchRegex)
            .with_kwarg("column", json!("email"));
        let result = ValidationResult::new(
            "suite",
            "asset",
            vec![ExpectationResult::from_exception(config, "Missing required kwarg 'regex'")],
        );
        let output = HumanFormatter::with_config(FormatterConfig::default().with_colors(false))
            .format(&result)
            .unwrap();
        assert!(output.contains("Exception: Missing required kwarg 'regex'"));
    }
}
