//! Prelude for commonly used types and traits in db-expectations.

pub use crate::core::{ValidationResult, ValidatorConfig};
pub use crate::error::{ExpectationsError, Result};
pub use crate::expectation::{ExpectationConfig, ExpectationType};
pub use crate::formatters::{FormatterConfig, ResultFormatter};
pub use crate::hooks::{ValidationGuard, ValidationHook};
pub use crate::validator::{DatabaseValidator, Validate};
