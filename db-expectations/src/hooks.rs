//! Validation hooks around async function calls.
//!
//! A [`ValidationHook`] describes what to validate (a table or a query) and
//! how to react to a failed validation. The hook functions run it before
//! and/or after an arbitrary async call:
//!
//! ```rust,ignore
//! use db_expectations::hooks::{validate_after, ValidationHook};
//! use db_expectations::suites;
//!
//! # async fn example(validator: &db_expectations::validator::DatabaseValidator) -> db_expectations::prelude::Result<()> {
//! let hook = ValidationHook::table("users", suites::unique_checks(["email"]));
//! let inserted = validate_after(validator, &hook, "insert_user", || async {
//!     // write to the database
//!     1
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! With `raise_on_failure` (the default) a failed validation becomes
//! [`ExpectationsError::ValidationFailed`] and errors from the validator are
//! returned as-is. Without it both are logged and the call proceeds.

use crate::core::ValidationResult;
use crate::error::ValidationStage;
use crate::expectation::ExpectationConfig;
use crate::prelude::*;
use crate::validator::Validate;
use std::future::Future;
use tracing::{error, info, warn};

/// What a hook validates.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationTarget {
    /// A table, by name
    Table(String),
    /// The result of a SQL query
    Query(String),
}

/// A validation to run around a function call.
#[derive(Debug, Clone)]
pub struct ValidationHook {
    target: ValidationTarget,
    suite_name: Option<String>,
    expectations: Vec<ExpectationConfig>,
    raise_on_failure: bool,
}

impl ValidationHook {
    /// Creates a hook that validates a table.
    pub fn table(table_name: impl Into<String>, expectations: Vec<ExpectationConfig>) -> Self {
        Self::new(ValidationTarget::Table(table_name.into()), expectations)
    }

    /// Creates a hook that validates the result of a query.
    ///
    /// The query result is registered as `<function>_pre` or `<function>_post`.
    pub fn query(query: impl Into<String>, expectations: Vec<ExpectationConfig>) -> Self {
        Self::new(ValidationTarget::Query(query.into()), expectations)
    }

    /// Creates a hook for a target.
    pub fn new(target: ValidationTarget, expectations: Vec<ExpectationConfig>) -> Self {
        Self {
            target,
            suite_name: None,
            expectations,
            raise_on_failure: true,
        }
    }

    /// Sets the suite name reported in results.
    pub fn with_suite_name(mut self, suite_name: impl Into<String>) -> Self {
        self.suite_name = Some(suite_name.into());
        self
    }

    /// Sets whether a failed validation aborts the call with an error.
    pub fn with_raise_on_failure(mut self, raise_on_failure: bool) -> Self {
        self.raise_on_failure = raise_on_failure;
        self
    }

    /// Returns the validation target.
    pub fn target(&self) -> &ValidationTarget {
        &self.target
    }

    /// Returns the expectations the hook runs.
    pub fn expectations(&self) -> &[ExpectationConfig] {
        &self.expectations
    }

    /// Returns whether a failed validation aborts the call.
    pub fn raise_on_failure(&self) -> bool {
        self.raise_on_failure
    }

    /// Runs the validation for `function` at `stage`.
    ///
    /// Returns `Ok(None)` when the validator failed and the error was logged
    /// instead of raised.
    pub async fn run<V>(
        &self,
        validator: &V,
        function: &str,
        stage: ValidationStage,
    ) -> Result<Option<ValidationResult>>
    where
        V: Validate + ?Sized,
    {
        info!(function = %function, stage = %stage, "Running validation hook");

        let outcome = match &self.target {
            ValidationTarget::Table(table) => {
                validator
                    .validate_table(table, self.suite_name.as_deref(), &self.expectations)
                    .await
            }
            ValidationTarget::Query(query) => {
                let base = asset_base_name(function);
                let asset_name = match stage {
                    ValidationStage::Pre => format!("{base}_pre"),
                    ValidationStage::Post => format!("{base}_post"),
                };
                validator
                    .validate_query(
                        query,
                        &self.expectations,
                        Some(&asset_name),
                        self.suite_name.as_deref(),
                    )
                    .await
            }
        };

        match outcome {
            Ok(result) if result.success => {
                info!(function = %function, stage = %stage, "Validation passed");
                Ok(Some(result))
            }
            Ok(result) => {
                let unsuccessful = result.statistics.unsuccessful_expectations;
                if self.raise_on_failure {
                    error!(function = %function, stage = %stage, unsuccessful, "Validation failed");
                    return Err(ExpectationsError::ValidationFailed {
                        stage,
                        function: function.to_string(),
                        unsuccessful,
                    });
                }
                warn!(function = %function, stage = %stage, unsuccessful, "Validation failed");
                Ok(Some(result))
            }
            Err(e) => {
                error!(function = %function, stage = %stage, error = %e, "Validation error");
                if self.raise_on_failure {
                    Err(e)
                } else {
                    Ok(None)
                }
            }
        }
    }
}

/// Validates, then runs `f`.
///
/// `f` does not run when a raising validation fails.
pub async fn validate_before<V, F, Fut, T>(
    validator: &V,
    hook: &ValidationHook,
    function: &str,
    f: F,
) -> Result<T>
where
    V: Validate + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    hook.run(validator, function, ValidationStage::Pre).await?;
    Ok(f().await)
}

/// Runs `f`, then validates.
///
/// The output of `f` is returned only if the validation did not raise.
pub async fn validate_after<V, F, Fut, T>(
    validator: &V,
    hook: &ValidationHook,
    function: &str,
    f: F,
) -> Result<T>
where
    V: Validate + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let output = f().await;
    hook.run(validator, function, ValidationStage::Post).await?;
    Ok(output)
}

/// Validates with `before`, runs `f`, then validates with `after`.
pub async fn validate_both<V, F, Fut, T>(
    validator: &V,
    before: &ValidationHook,
    after: &ValidationHook,
    function: &str,
    f: F,
) -> Result<T>
where
    V: Validate + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    before.run(validator, function, ValidationStage::Pre).await?;
    let output = f().await;
    after.run(validator, function, ValidationStage::Post).await?;
    Ok(output)
}

/// Builder form of the hook functions.
///
/// # Examples
///
/// ```rust,ignore
/// use db_expectations::hooks::{ValidationGuard, ValidationHook};
/// use db_expectations::suites;
///
/// # async fn example(validator: &db_expectations::validator::DatabaseValidator) -> db_expectations::prelude::Result<()> {
/// let processed = ValidationGuard::new(validator, "process_orders")
///     .before(ValidationHook::table("orders", suites::row_count_check(1, None)))
///     .after(ValidationHook::table("orders", suites::null_checks(["order_id"])))
///     .run(|| async { 42 })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ValidationGuard<'a, V: ?Sized> {
    validator: &'a V,
    function: String,
    before: Option<ValidationHook>,
    after: Option<ValidationHook>,
}

impl<'a, V> ValidationGuard<'a, V>
where
    V: Validate + ?Sized,
{
    /// Creates a guard for the named function.
    pub fn new(validator: &'a V, function: impl Into<String>) -> Self {
        Self {
            validator,
            function: function.into(),
            before: None,
            after: None,
        }
    }

    /// Sets the validation to run before the call.
    pub fn before(mut self, hook: ValidationHook) -> Self {
        self.before = Some(hook);
        self
    }

    /// Sets the validation to run after the call.
    pub fn after(mut self, hook: ValidationHook) -> Self {
        self.after = Some(hook);
        self
    }

    /// Runs `f` between the configured validations.
    pub async fn run<F, Fut, T>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(hook) = &self.before {
            hook.run(self.validator, &self.function, ValidationStage::Pre)
                .await?;
        }
        let output = f().await;
        if let Some(hook) = &self.after {
            hook.run(self.validator, &self.function, ValidationStage::Post)
                .await?;
        }
        Ok(output)
    }
}

/// Turns a function name such as `etl::load_products` into an identifier
/// usable as a table name.
fn asset_base_name(function: &str) -> String {
    let mut name: String = function
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}
