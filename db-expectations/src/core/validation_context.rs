//! Validation context for passing the table under validation to constraints.

use crate::prelude::*;
use crate::security::SqlSecurity;
use std::sync::Arc;

/// Runtime context for validation operations.
///
/// Holds the name of the registered table (or query asset) that the current
/// expectations run against.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    table_name: Arc<str>,
}

impl ValidationContext {
    /// Creates a new validation context for the given table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use db_expectations::core::ValidationContext;
    ///
    /// let ctx = ValidationContext::new("customer_data");
    /// assert_eq!(ctx.table_name(), "customer_data");
    /// ```
    pub fn new(table_name: impl Into<Arc<str>>) -> Self {
        Self {
            table_name: table_name.into(),
        }
    }

    /// Returns the name of the table being validated.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns the table name quoted for use in SQL.
    pub fn quoted_table(&self) -> Result<String> {
        SqlSecurity::escape_identifier(&self.table_name)
    }
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self::new("data")
    }
}

tokio::task_local! {
    pub static CURRENT_CONTEXT: ValidationContext;
}

/// Gets the current validation context.
///
/// Returns the default context (table `data`) if no context has been set.
pub fn current_validation_context() -> ValidationContext {
    CURRENT_CONTEXT
        .try_with(|ctx| ctx.clone())
        .unwrap_or_default()
}
