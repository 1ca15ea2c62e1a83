//! Database connectivity through datafusion-table-providers.
//!
//! Tables are exposed as DataFusion table providers, so filters and
//! aggregates from expectation queries are pushed down to the database where
//! the provider supports it.

use super::DataSource;
use crate::prelude::*;
use crate::security::{SecureString, SqlSecurity};
use async_trait::async_trait;
use datafusion::catalog::TableProvider;
use datafusion::prelude::SessionContext;
use datafusion::sql::TableReference;
use std::sync::Arc;
use tracing::{debug, instrument};

#[cfg(feature = "postgres")]
use datafusion_table_providers::{
    postgres::PostgresTableFactory, sql::db_connection_pool::postgrespool::PostgresConnectionPool,
};

#[cfg(feature = "mysql")]
use datafusion_table_providers::{
    mysql::MySQLTableFactory, sql::db_connection_pool::mysqlpool::MySQLConnectionPool,
};

#[cfg(any(feature = "postgres", feature = "mysql"))]
use datafusion_table_providers::util::secrets::to_secret_map;

#[cfg(feature = "mysql")]
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

#[cfg(feature = "sqlite")]
use datafusion_table_providers::{
    sql::db_connection_pool::{sqlitepool::SqliteConnectionPoolFactory, Mode},
    sqlite::SqliteTableFactory,
};

/// SQLite's name for a private in-memory database.
pub const SQLITE_MEMORY_PATH: &str = ":memory:";

/// Connection parameters for a database server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server hostname
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database name
    pub database: String,
    /// Login user
    pub username: String,
    /// Login password
    pub password: SecureString,
    /// TLS mode passed to the driver (e.g. `disable`, `require`)
    pub sslmode: Option<String>,
}

/// Database connection configuration.
///
/// Every variant is always available; whether a backend can actually be used
/// depends on the cargo features the crate was built with.
///
/// # Examples
///
/// ```rust
/// use db_expectations::sources::DatabaseConfig;
///
/// let sqlite = DatabaseConfig::SQLite("path/to/database.db".to_string());
/// assert_eq!(sqlite.database_type(), "SQLite");
/// ```
#[derive(Debug, Clone)]
pub enum DatabaseConfig {
    /// PostgreSQL server
    PostgreSQL(ServerConfig),
    /// MySQL server
    MySQL(ServerConfig),
    /// SQLite database file, or `:memory:`
    SQLite(String),
    /// No backing database; tables must be registered with the session directly
    Memory,
}

impl DatabaseConfig {
    /// Returns a human-readable description of the database type.
    pub fn database_type(&self) -> &'static str {
        match self {
            DatabaseConfig::PostgreSQL(_) => "PostgreSQL",
            DatabaseConfig::MySQL(_) => "MySQL",
            DatabaseConfig::SQLite(_) => "SQLite",
            DatabaseConfig::Memory => "Memory",
        }
    }

    /// Returns true if the crate was built with support for this backend.
    pub fn is_enabled(&self) -> bool {
        match self {
            DatabaseConfig::PostgreSQL(_) => cfg!(feature = "postgres"),
            DatabaseConfig::MySQL(_) => cfg!(feature = "mysql"),
            DatabaseConfig::SQLite(_) => cfg!(feature = "sqlite"),
            DatabaseConfig::Memory => true,
        }
    }
}

/// A single database table exposed as a DataFusion table.
///
/// # Examples
///
/// ```rust,ignore
/// use db_expectations::sources::{DataSource, DatabaseConfig, DatabaseSource};
/// use datafusion::prelude::SessionContext;
///
/// # async fn example() -> db_expectations::prelude::Result<()> {
/// let source = DatabaseSource::new(DatabaseConfig::SQLite("shop.db".into()), "orders")?;
/// let ctx = SessionContext::new();
/// source.register(&ctx, "orders_asset_1").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseSource {
    config: DatabaseConfig,
    table_name: String,
}

impl DatabaseSource {
    /// Creates a source for `table_name` in the configured database.
    ///
    /// The table name may be schema-qualified (`sales.orders`).
    pub fn new(config: DatabaseConfig, table_name: impl Into<String>) -> Result<Self> {
        let table_name = table_name.into();
        SqlSecurity::validate_identifier(&table_name)?;
        Ok(Self { config, table_name })
    }

    /// Returns the name of the table in the database.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Creates a table provider for the configured database type.
    #[instrument(skip(self), fields(db_type = %self.config.database_type(), table = %self.table_name))]
    pub async fn table_provider(&self) -> Result<Arc<dyn TableProvider>> {
        let table = SqlSecurity::table_reference(&self.table_name)?;
        match &self.config {
            DatabaseConfig::SQLite(path) if path.is_empty() || path == SQLITE_MEMORY_PATH => {
                Err(ExpectationsError::Configuration(format!(
                    "Cannot read table '{}' from in-memory SQLite: each connection pool opens its own empty database",
                    self.table_name
                )))
            }
            DatabaseConfig::PostgreSQL(server) => postgres_provider(server, table).await,
            DatabaseConfig::MySQL(server) => mysql_provider(server, table).await,
            DatabaseConfig::SQLite(path) => sqlite_provider(path, table).await,
            DatabaseConfig::Memory => Err(ExpectationsError::TableNotFound {
                table: self.table_name.clone(),
            }),
        }
    }
}

#[async_trait]
impl DataSource for DatabaseSource {
    #[instrument(skip(self, ctx), fields(db_type = %self.config.database_type(), table = %self.table_name, table_name = %table_name))]
    async fn register(&self, ctx: &SessionContext, table_name: &str) -> Result<()> {
        let provider = self.table_provider().await?;
        let reference = SqlSecurity::table_reference(table_name)?;

        ctx.register_table(reference, provider)
            .map_err(|e| ExpectationsError::DataSource {
                source_type: self.config.database_type().to_string(),
                message: format!("Failed to register table '{table_name}': {e}"),
                source: Some(Box::new(e)),
            })?;

        debug!(table_name = %table_name, "Registered database table");
        Ok(())
    }

    fn description(&self) -> String {
        let table_name = &self.table_name;
        match &self.config {
            DatabaseConfig::PostgreSQL(ServerConfig {
                host,
                port,
                database,
                ..
            }) => format!("PostgreSQL table '{table_name}' at {host}:{port}/{database}"),
            DatabaseConfig::MySQL(ServerConfig {
                host,
                port,
                database,
                ..
            }) => format!("MySQL table '{table_name}' at {host}:{port}/{database}"),
            DatabaseConfig::SQLite(path) => format!("SQLite table '{table_name}' at {path}"),
            DatabaseConfig::Memory => format!("In-memory table '{table_name}'"),
        }
    }
}

#[cfg(any(not(feature = "postgres"), not(feature = "mysql"), not(feature = "sqlite")))]
fn feature_disabled(database_type: &str, feature: &str) -> ExpectationsError {
    ExpectationsError::NotSupported(format!(
        "{database_type} support is not enabled; rebuild with the '{feature}' feature"
    ))
}

#[cfg(any(feature = "postgres", feature = "mysql", feature = "sqlite"))]
fn provider_error(
    source_type: &str,
    table: &TableReference,
    e: impl std::fmt::Display,
) -> ExpectationsError {
    ExpectationsError::data_source(
        source_type,
        format!("Failed to create table provider for '{table}': {e}"),
    )
}

#[cfg(feature = "postgres")]
async fn postgres_provider(
    server: &ServerConfig,
    table: TableReference,
) -> Result<Arc<dyn TableProvider>> {
    let mut params = std::collections::HashMap::new();
    params.insert("host".to_string(), server.host.clone());
    params.insert("port".to_string(), server.port.to_string());
    params.insert("db".to_string(), server.database.clone());
    params.insert("user".to_string(), server.username.clone());
    params.insert("pass".to_string(), server.password.expose().to_string());
    params.insert(
        "sslmode".to_string(),
        server.sslmode.clone().unwrap_or_else(|| "disable".to_string()),
    );

    let pool = Arc::new(
        PostgresConnectionPool::new(to_secret_map(params))
            .await
            .map_err(|e| {
                ExpectationsError::data_source_with_source(
                    "PostgreSQL",
                    "Failed to create PostgreSQL connection pool",
                    Box::new(e),
                )
            })?,
    );

    PostgresTableFactory::new(pool)
        .table_provider(table.clone())
        .await
        .map_err(|e| provider_error("PostgreSQL", &table, e))
}

#[cfg(not(feature = "postgres"))]
async fn postgres_provider(
    _server: &ServerConfig,
    _table: TableReference,
) -> Result<Arc<dyn TableProvider>> {
    Err(feature_disabled("PostgreSQL", "postgres"))
}

#[cfg(feature = "mysql")]
async fn mysql_provider(
    server: &ServerConfig,
    table: TableReference,
) -> Result<Arc<dyn TableProvider>> {
    let connection_string = format!(
        "mysql://{}:{}@{}:{}/{}",
        utf8_percent_encode(&server.username, NON_ALPHANUMERIC),
        utf8_percent_encode(server.password.expose(), NON_ALPHANUMERIC),
        server.host,
        server.port,
        server.database
    );
    let mut params = std::collections::HashMap::new();
    params.insert("connection_string".to_string(), connection_string);
    params.insert(
        "sslmode".to_string(),
        server.sslmode.clone().unwrap_or_else(|| "disabled".to_string()),
    );

    let pool = Arc::new(
        MySQLConnectionPool::new(to_secret_map(params))
            .await
            .map_err(|e| {
                ExpectationsError::data_source_with_source(
                    "MySQL",
                    "Failed to create MySQL connection pool",
                    Box::new(e),
                )
            })?,
    );

    MySQLTableFactory::new(pool)
        .table_provider(table.clone())
        .await
        .map_err(|e| provider_error("MySQL", &table, e))
}

#[cfg(not(feature = "mysql"))]
async fn mysql_provider(
    _server: &ServerConfig,
    _table: TableReference,
) -> Result<Arc<dyn TableProvider>> {
    Err(feature_disabled("MySQL", "mysql"))
}

#[cfg(feature = "sqlite")]
async fn sqlite_provider(path: &str, table: TableReference) -> Result<Arc<dyn TableProvider>> {
    let pool = Arc::new(
        SqliteConnectionPoolFactory::new(path, Mode::File, std::time::Duration::from_millis(5000))
            .build()
            .await
            .map_err(|e| {
                ExpectationsError::data_source(
                    "SQLite",
                    format!("Failed to create SQLite connection pool: {e}"),
                )
            })?,
    );

    SqliteTableFactory::new(pool)
        .table_provider(table.clone())
        .await
        .map_err(|e| provider_error("SQLite", &table, e))
}

#[cfg(not(feature = "sqlite"))]
async fn sqlite_provider(_path: &str, _table: TableReference) -> Result<Arc<dyn TableProvider>> {
    Err(feature_disabled("SQLite", "sqlite"))
}
