//! Security utilities for building SQL from expectation descriptors.
//!
//! Expectation kwargs come from callers and configuration files, so every
//! identifier, literal and regex that ends up in generated SQL passes through
//! this module first. Credentials from connection strings are held in a
//! [`SecureString`] that is zeroized on drop.

use crate::error::{ExpectationsError, Result};
use datafusion::sql::TableReference;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secure string that automatically clears its contents when dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecureString(String);

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString(***)")
    }
}

impl SecureString {
    /// Create a new secure string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the string value. Use carefully and avoid storing the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true if the wrapped value is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to a regular string. The SecureString will be zeroized.
    pub fn into_string(mut self) -> String {
        let value = std::mem::take(&mut self.0);
        self.0.zeroize();
        value
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Maximum length of a single identifier part.
const MAX_IDENTIFIER_LEN: usize = 128;
/// Maximum length of a regex taken from an expectation.
const MAX_REGEX_LEN: usize = 1000;
/// Maximum length of an ad-hoc validation query.
const MAX_QUERY_LEN: usize = 100_000;

/// SQL identifier and literal validation and escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates and quotes a SQL identifier (table or column name).
    ///
    /// Qualified names such as `public.users` are quoted part by part, so the
    /// result keeps the exact case of every part.
    ///
    /// # Examples
    /// ```rust
    /// use db_expectations::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::escape_identifier("customer_id").unwrap(), "\"customer_id\"");
    /// assert_eq!(SqlSecurity::escape_identifier("public.users").unwrap(), "\"public\".\"users\"");
    /// assert!(SqlSecurity::escape_identifier("id; DROP TABLE users--").is_err());
    /// ```
    pub fn escape_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;

        Ok(identifier
            .split('.')
            .map(|part| format!("\"{part}\""))
            .collect::<Vec<_>>()
            .join("."))
    }

    /// Validates a SQL identifier without escaping it.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.is_empty() || identifier.trim().is_empty() {
            return Err(ExpectationsError::SecurityError(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier.contains('\0') {
            return Err(ExpectationsError::SecurityError(
                "SQL identifier cannot contain null bytes".to_string(),
            ));
        }

        if identifier
            .split('.')
            .any(|part| part.len() > MAX_IDENTIFIER_LEN)
        {
            return Err(ExpectationsError::SecurityError(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LEN} characters per part)"
            )));
        }

        static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
            // Letters, digits and underscores; dots separate qualified parts.
            #[allow(clippy::expect_used)]
            Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)*$")
                .expect("Hard-coded regex pattern should be valid")
        });

        if !IDENTIFIER_REGEX.is_match(identifier) {
            return Err(ExpectationsError::SecurityError(format!(
                "Invalid SQL identifier format: '{identifier}'. Identifiers must start with a letter or underscore and contain only letters, numbers, underscores, and dots"
            )));
        }

        Ok(())
    }

    /// Builds a case-preserving DataFusion table reference for a validated name.
    pub fn table_reference(identifier: &str) -> Result<TableReference> {
        Self::validate_identifier(identifier)?;

        let parts: Vec<&str> = identifier.split('.').collect();
        match parts.as_slice() {
            [table] => Ok(TableReference::bare(*table)),
            [schema, table] => Ok(TableReference::partial(*schema, *table)),
            [catalog, schema, table] => Ok(TableReference::full(*catalog, *schema, *table)),
            _ => Err(ExpectationsError::SecurityError(format!(
                "Table name '{identifier}' has too many qualifiers"
            ))),
        }
    }

    /// Validates a regex pattern and escapes it for use inside a SQL string literal.
    pub fn validate_regex_pattern(pattern: &str) -> Result<String> {
        if pattern.len() > MAX_REGEX_LEN {
            return Err(ExpectationsError::SecurityError(format!(
                "Regex pattern too long (max {MAX_REGEX_LEN} characters)"
            )));
        }

        if pattern.contains('\0') {
            return Err(ExpectationsError::SecurityError(
                "Regex pattern cannot contain null bytes".to_string(),
            ));
        }

        Regex::new(pattern).map_err(|e| {
            ExpectationsError::SecurityError(format!("Invalid regex pattern: {e}"))
        })?;

        Self::check_redos_patterns(pattern)?;

        Ok(pattern.replace('\'', "''"))
    }

    /// Quotes a string as a SQL literal.
    pub fn escape_string_literal(value: &str) -> Result<String> {
        if value.contains('\0') {
            return Err(ExpectationsError::SecurityError(
                "SQL literal cannot contain null bytes".to_string(),
            ));
        }
        Ok(format!("'{}'", value.replace('\'', "''")))
    }

    /// Renders a scalar JSON value as a SQL literal.
    ///
    /// Arrays and objects have no literal form and are rejected.
    pub fn json_literal(value: &Value) -> Result<String> {
        match value {
            Value::Null => Ok("NULL".to_string()),
            Value::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(i.to_string())
                } else if let Some(u) = n.as_u64() {
                    Ok(u.to_string())
                } else {
                    match n.as_f64() {
                        Some(f) if f.is_finite() => Ok(format!("{f:?}")),
                        _ => Err(ExpectationsError::SecurityError(format!(
                            "Numeric literal {n} is not finite"
                        ))),
                    }
                }
            }
            Value::String(s) => Self::escape_string_literal(s),
            Value::Array(_) | Value::Object(_) => Err(ExpectationsError::SecurityError(format!(
                "Cannot use {value} as a SQL literal"
            ))),
        }
    }

    /// Performs basic sanity checks on an ad-hoc validation query.
    ///
    /// Statement-level checks (single read-only query) happen when the query
    /// is parsed by the validator.
    pub fn validate_query_text(query: &str) -> Result<()> {
        if query.trim().is_empty() {
            return Err(ExpectationsError::SecurityError(
                "Validation query cannot be empty".to_string(),
            ));
        }

        if query.len() > MAX_QUERY_LEN {
            return Err(ExpectationsError::SecurityError(format!(
                "Validation query too long (max {MAX_QUERY_LEN} characters)"
            )));
        }

        if query.contains('\0') {
            return Err(ExpectationsError::SecurityError(
                "Validation query cannot contain null bytes".to_string(),
            ));
        }

        Ok(())
    }

    /// Checks for patterns that might cause catastrophic backtracking.
    fn check_redos_patterns(pattern: &str) -> Result<()> {
        let dangerous_patterns = &["(.*)*", "(.*)+", "(a+)+", "(a*)*"];

        for dangerous in dangerous_patterns {
            if pattern.contains(dangerous) {
                return Err(ExpectationsError::SecurityError(
                    "Regex pattern might cause ReDoS attack".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Input validation utilities for numeric kwargs.
pub struct InputValidator;

impl InputValidator {
    /// Validates a numeric threshold value.
    pub fn validate_threshold(value: f64, name: &str) -> Result<()> {
        if !value.is_finite() {
            return Err(ExpectationsError::Configuration(format!(
                "Invalid {name} value: must be finite (not NaN or infinite)"
            )));
        }
        Ok(())
    }

    /// Validates a fraction value (0.0 to 1.0), such as `mostly`.
    pub fn validate_fraction(value: f64, name: &str) -> Result<()> {
        Self::validate_threshold(value, name)?;

        if !(0.0..=1.0).contains(&value) {
            return Err(ExpectationsError::Configuration(format!(
                "Invalid {name} value: must be between 0.0 and 1.0, got {value}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_secure_string_debug_is_masked() {
        let secure = SecureString::new("secret123");
        assert_eq!(format!("{secure:?}"), "SecureString(***)");
        assert_eq!(secure.expose(), "secret123");
        assert_eq!(secure.into_string(), "secret123");
    }

    #[test]
    fn test_valid_sql_identifiers() {
        assert!(SqlSecurity::validate_identifier("customer_id").is_ok());
        assert!(SqlSecurity::validate_identifier("created_at").is_ok());
        assert!(SqlSecurity::validate_identifier("CustomerId").is_ok());
        assert!(SqlSecurity::validate_identifier("_private_col").is_ok());
        assert!(SqlSecurity::validate_identifier("schema.table").is_ok());
    }

    #[test]
    fn test_invalid_sql_identifiers() {
        assert!(SqlSecurity::validate_identifier("").is_err());
        assert!(SqlSecurity::validate_identifier(&"a".repeat(200)).is_err());
        assert!(SqlSecurity::validate_identifier("id; DROP TABLE").is_err());
        assert!(SqlSecurity::validate_identifier("col--comment").is_err());
        assert!(SqlSecurity::validate_identifier("col name").is_err());
        assert!(SqlSecurity::validate_identifier("col-name").is_err());
        assert!(SqlSecurity::validate_identifier("123col").is_err());
        assert!(SqlSecurity::validate_identifier("col\"quoted").is_err());
    }

    #[test]
    fn test_identifier_escaping_preserves_case() {
        assert_eq!(
            SqlSecurity::escape_identifier("InvoiceId").unwrap(),
            "\"InvoiceId\""
        );
        assert_eq!(
            SqlSecurity::escape_identifier("sales.orders").unwrap(),
            "\"sales\".\"orders\""
        );
    }

    #[test]
    fn test_table_reference() {
        assert_eq!(
            SqlSecurity::table_reference("Users").unwrap(),
            TableReference::bare("Users")
        );
        assert_eq!(
            SqlSecurity::table_reference("public.users").unwrap(),
            TableReference::partial("public", "users")
        );
        assert!(SqlSecurity::table_reference("a.b.c.d").is_err());
    }

    #[test]
    fn test_regex_pattern_validation() {
        assert!(SqlSecurity::validate_regex_pattern(r"^[A-Z]\d+$").is_ok());
        assert!(SqlSecurity::validate_regex_pattern(r"[unclosed").is_err());
        assert!(SqlSecurity::validate_regex_pattern(&"a".repeat(2000)).is_err());
        assert!(SqlSecurity::validate_regex_pattern("(.*)*x").is_err());
        assert_eq!(
            SqlSecurity::validate_regex_pattern("it's").unwrap(),
            "it''s"
        );
    }

    #[test]
    fn test_json_literals() {
        assert_eq!(SqlSecurity::json_literal(&json!(null)).unwrap(), "NULL");
        assert_eq!(SqlSecurity::json_literal(&json!(true)).unwrap(), "TRUE");
        assert_eq!(SqlSecurity::json_literal(&json!(42)).unwrap(), "42");
        assert_eq!(SqlSecurity::json_literal(&json!(0.5)).unwrap(), "0.5");
        assert_eq!(SqlSecurity::json_literal(&json!(1.0)).unwrap(), "1.0");
        assert_eq!(
            SqlSecurity::json_literal(&json!("O'Brien")).unwrap(),
            "'O''Brien'"
        );
        assert!(SqlSecurity::json_literal(&json!([1, 2])).is_err());
        assert!(SqlSecurity::json_literal(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_query_text_validation() {
        assert!(SqlSecurity::validate_query_text("SELECT * FROM users").is_ok());
        assert!(SqlSecurity::validate_query_text("   ").is_err());
        assert!(SqlSecurity::validate_query_text("SELECT 1\0").is_err());
    }

    #[test]
    fn test_fraction_validation() {
        assert!(InputValidator::validate_fraction(0.95, "mostly").is_ok());
        assert!(InputValidator::validate_fraction(1.5, "mostly").is_err());
        assert!(InputValidator::validate_fraction(-0.1, "mostly").is_err());
        assert!(InputValidator::validate_fraction(f64::NAN, "mostly").is_err());
    }
}
