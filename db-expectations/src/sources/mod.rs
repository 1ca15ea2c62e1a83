//! Data sources that can be registered with a DataFusion session.
//!
//! Database tables are exposed through datafusion-table-providers. Each
//! backend sits behind a cargo feature (`postgres`, `mysql`, `sqlite`);
//! registering a table for a backend whose feature is disabled fails with
//! [`ExpectationsError::NotSupported`](crate::error::ExpectationsError::NotSupported).

use crate::prelude::*;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::fmt::Debug;

mod database;

pub use database::{DatabaseConfig, DatabaseSource, ServerConfig, SQLITE_MEMORY_PATH};

/// A data source that can be registered with a DataFusion context.
///
/// # Examples
///
/// ```rust,ignore
/// use db_expectations::sources::{DataSource, DatabaseConfig, DatabaseSource};
///
/// # async fn example() -> db_expectations::prelude::Result<()> {
/// let source = DatabaseSource::new(DatabaseConfig::SQLite("shop.db".into()), "orders")?;
/// let ctx = datafusion::prelude::SessionContext::new();
/// source.register(&ctx, "orders").await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait DataSource: Debug + Send + Sync {
    /// Registers this data source with the given session context under `table_name`.
    async fn register(&self, ctx: &SessionContext, table_name: &str) -> Result<()>;

    /// Returns a human-readable description of this data source.
    fn description(&self) -> String;
}
