//! Core evaluation types.
//!
//! ## Overview
//!
//! - **[`Constraint`]**: an expectation compiled into DataFusion SQL
//!   (implementations live in the `constraints` module)
//! - **[`ValidationContext`]**: the table the current run validates, passed
//!   to constraints through a task-local
//! - **[`ValidatorConfig`]**: session and evaluation settings
//! - **[`ValidationResult`]**: the outcome of running a list of expectations
//!
//! ## Architecture
//!
//! ```text
//! run_expectations(asset)
//!     ├── ExpectationConfig ──build_constraint──> Constraint ──evaluate──> ExpectationResult
//!     ├── ExpectationConfig ──(unknown type, skipped)
//!     └── ...
//!                                                    └──> ValidationResult + statistics
//! ```

pub mod constraint;
pub mod context;
pub mod result;
pub mod runner;
pub mod validation_context;

pub use constraint::{BoxedConstraint, Constraint, ExpectationOutcome, ObservedResult};
pub use context::{ValidatorConfig, DEFAULT_PARTIAL_UNEXPECTED_COUNT};
pub use result::{ExceptionInfo, ExpectationResult, ValidationResult, ValidationStatistics};
pub use runner::run_expectations;
pub use validation_context::{current_validation_context, ValidationContext, CURRENT_CONTEXT};
