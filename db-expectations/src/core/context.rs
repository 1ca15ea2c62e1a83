//! DataFusion session configuration for validation workloads.

use crate::prelude::*;
use datafusion::execution::context::{SessionConfig, SessionContext};
use datafusion::execution::memory_pool::{FairSpillPool, MemoryPool};
use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use std::sync::Arc;
use tracing::instrument;

/// Default number of sample unexpected values kept per expectation.
pub const DEFAULT_PARTIAL_UNEXPECTED_COUNT: usize = 20;

/// Configuration for a [`DatabaseValidator`](crate::validator::DatabaseValidator).
///
/// # Examples
///
/// ```rust
/// use db_expectations::core::ValidatorConfig;
///
/// let config = ValidatorConfig::default()
///     .with_batch_size(4096)
///     .with_partial_unexpected_count(5);
/// assert_eq!(config.partial_unexpected_count, 5);
/// ```
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Batch size for query execution
    pub batch_size: usize,
    /// Target number of partitions for parallel execution
    pub target_partitions: usize,
    /// Maximum memory for query execution (in bytes)
    pub max_memory: usize,
    /// Turn per-expectation evaluation errors into failed results instead of errors
    pub catch_exceptions: bool,
    /// Number of sample unexpected values reported per expectation
    pub partial_unexpected_count: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            target_partitions: std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4),
            max_memory: 2 * 1024 * 1024 * 1024, // 2GB
            catch_exceptions: true,
            partial_unexpected_count: DEFAULT_PARTIAL_UNEXPECTED_COUNT,
        }
    }
}

impl ValidatorConfig {
    /// Preset for small local databases and tests.
    pub fn lightweight() -> Self {
        Self {
            batch_size: 1024,
            target_partitions: 1,
            max_memory: 256 * 1024 * 1024,
            ..Self::default()
        }
    }

    /// Preset for large warehouse tables.
    pub fn high_throughput() -> Self {
        Self {
            batch_size: 32768,
            max_memory: 8 * 1024 * 1024 * 1024,
            ..Self::default()
        }
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the target partition count.
    pub fn with_target_partitions(mut self, target_partitions: usize) -> Self {
        self.target_partitions = target_partitions;
        self
    }

    /// Sets the memory limit in bytes.
    pub fn with_max_memory(mut self, max_memory: usize) -> Self {
        self.max_memory = max_memory;
        self
    }

    /// Sets whether evaluation errors are caught into the result.
    pub fn with_catch_exceptions(mut self, catch_exceptions: bool) -> Self {
        self.catch_exceptions = catch_exceptions;
        self
    }

    /// Sets how many unexpected values are sampled per expectation.
    pub fn with_partial_unexpected_count(mut self, count: usize) -> Self {
        self.partial_unexpected_count = count;
        self
    }

    /// Checks that the configuration can be used to build a session.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ExpectationsError::Configuration(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if self.target_partitions == 0 {
            return Err(ExpectationsError::Configuration(
                "target_partitions must be greater than 0".to_string(),
            ));
        }
        if self.max_memory == 0 {
            return Err(ExpectationsError::Configuration(
                "max_memory must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds a DataFusion session using this configuration.
    #[instrument(skip(self), fields(batch_size = self.batch_size, target_partitions = self.target_partitions))]
    pub fn build_session(&self) -> Result<SessionContext> {
        self.validate()?;

        let session_config = SessionConfig::new()
            .with_batch_size(self.batch_size)
            .with_target_partitions(self.target_partitions)
            .with_information_schema(true);

        let memory_pool = Arc::new(FairSpillPool::new(self.max_memory)) as Arc<dyn MemoryPool>;

        let runtime_env = RuntimeEnvBuilder::new()
            .with_memory_pool(memory_pool)
            .with_temp_file_path(std::env::temp_dir())
            .build()
            .map(Arc::new)?;

        Ok(SessionContext::new_with_config_rt(session_config, runtime_env))
    }
}
