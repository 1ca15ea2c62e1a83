//! Error types for the db-expectations library.
//!
//! All fallible operations return [`ExpectationsError`]. Errors raised by
//! DataFusion, Arrow and the database providers are carried through unchanged
//! so callers can inspect the original failure.

use std::fmt;
use thiserror::Error;

/// The point in a guarded call at which validation ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    /// Validation before the wrapped function ran
    Pre,
    /// Validation after the wrapped function returned
    Post,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStage::Pre => write!(f, "Pre-validation"),
            ValidationStage::Post => write!(f, "Post-validation"),
        }
    }
}

/// The main error type for the db-expectations library.
#[derive(Error, Debug)]
pub enum ExpectationsError {
    /// A guarded validation finished with a failing result.
    #[error("{stage} failed for {function}")]
    ValidationFailed {
        /// Whether the failure happened before or after the call
        stage: ValidationStage,
        /// Name of the guarded function
        function: String,
        /// Number of expectations that did not succeed
        unsuccessful: usize,
    },

    /// An expectation descriptor is malformed for its type.
    #[error("Invalid expectation '{expectation_type}': {message}")]
    InvalidExpectation {
        /// The `expectation_type` of the descriptor
        expectation_type: String,
        /// What is wrong with it
        message: String,
    },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from a database connection or table provider.
    #[error("Data source error: {message}")]
    DataSource {
        /// Type of data source (e.g., "SQLite", "PostgreSQL")
        source_type: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error related to configuration or input shape.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error when a table is not registered and cannot be loaded.
    #[error("Table '{table}' not found")]
    TableNotFound { table: String },

    /// Error when a required column is not found in the dataset.
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// Error when an operation is not supported.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Security-related error.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, ExpectationsError>`.
pub type Result<T> = std::result::Result<T, ExpectationsError>;

impl ExpectationsError {
    /// Creates a new data source error.
    pub fn data_source(source_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new data source error with a source error.
    pub fn data_source_with_source(
        source_type: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new invalid expectation error.
    pub fn invalid_expectation(
        expectation_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidExpectation {
            expectation_type: expectation_type.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error reports a failed guarded validation.
    pub fn is_validation_failure(&self) -> bool {
        matches!(self, Self::ValidationFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_validation_failed_message() {
        let err = ExpectationsError::ValidationFailed {
            stage: ValidationStage::Pre,
            function: "insert_user".to_string(),
            unsuccessful: 2,
        };
        assert_eq!(err.to_string(), "Pre-validation failed for insert_user");
        assert!(err.is_validation_failure());
    }

    #[test]
    fn test_data_source_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = ExpectationsError::data_source_with_source("SQLite", "open failed", Box::new(io));
        assert_eq!(err.to_string(), "Data source error: open failed");
        assert!(err.source().is_some());
        assert!(!err.is_validation_failure());
    }

    #[test]
    fn test_invalid_expectation() {
        let err = ExpectationsError::invalid_expectation(
            "expect_column_values_to_be_between",
            "min_value and max_value cannot both be null",
        );
        assert_eq!(
            err.to_string(),
            "Invalid expectation 'expect_column_values_to_be_between': min_value and max_value cannot both be null"
        );
    }

    #[test]
    fn test_table_not_found() {
        let err = ExpectationsError::TableNotFound {
            table: "users".to_string(),
        };
        assert_eq!(err.to_string(), "Table 'users' not found");
    }
}
