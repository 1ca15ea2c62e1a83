//! Database validator facade.
//!
//! [`DatabaseValidator`] connects to a database, exposes its tables to a
//! DataFusion session on demand and runs lists of expectation descriptors
//! against a table or the result of an ad-hoc query.
//!
//! # Example
//!
//! ```rust,ignore
//! use db_expectations::prelude::*;
//! use db_expectations::suites;
//!
//! # async fn example() -> Result<()> {
//! let validator = DatabaseValidator::connect("sqlite:///shop.db").await?;
//! let expectations = suites::combine([
//!     suites::null_checks(["id", "email"]),
//!     suites::unique_checks(["email"]),
//!     suites::row_count_check(1, None),
//! ]);
//!
//! let result = validator.validate_table("customers", None, &expectations).await?;
//! println!("{}", result.to_human()?);
//! validator.close().await?;
//! # Ok(())
//! # }
//! ```

use crate::connection::ConnectionString;
use crate::core::{run_expectations, ValidationResult, ValidatorConfig};
use crate::expectation::ExpectationConfig;
use crate::logging::truncate_field;
use crate::prelude::*;
use crate::security::SqlSecurity;
use crate::sources::{DataSource, DatabaseConfig, DatabaseSource};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::catalog::MemorySchemaProvider;
use datafusion::error::DataFusionError;
use datafusion::prelude::SessionContext;
use datafusion::sql::parser::{DFParser, Statement as DFStatement};
use datafusion::sql::resolve::resolve_table_references;
use datafusion::sql::sqlparser::ast::Statement as SqlStatement;
use datafusion::sql::TableReference;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// Runs expectations against tables and queries.
///
/// Implemented by [`DatabaseValidator`]; validation hooks accept any
/// implementation.
#[async_trait]
pub trait Validate: Send + Sync {
    /// Validates a table.
    ///
    /// Without a suite name, `<table>_suite_<n>` is used.
    async fn validate_table(
        &self,
        table_name: &str,
        suite_name: Option<&str>,
        expectations: &[ExpectationConfig],
    ) -> Result<ValidationResult>;

    /// Validates the result of a query.
    ///
    /// Without names, `query_asset_<n>` and `query_suite_<n>` are used.
    async fn validate_query(
        &self,
        query: &str,
        expectations: &[ExpectationConfig],
        asset_name: Option<&str>,
        suite_name: Option<&str>,
    ) -> Result<ValidationResult>;
}

/// Schema information for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name as requested
    pub name: String,
    /// Columns in schema order
    pub columns: Vec<ColumnInfo>,
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Arrow data type name
    pub data_type: String,
    /// Whether the column accepts nulls
    pub nullable: bool,
}

/// Validates database tables and queries with expectation descriptors.
///
/// Tables are registered with the underlying DataFusion session the first
/// time they are needed. Table assets only live for the validation that
/// created them; query assets and tables pulled in by queries stay until
/// [`close`](Self::close), which also runs on drop.
pub struct DatabaseValidator {
    connection: Option<ConnectionString>,
    database: DatabaseConfig,
    ctx: SessionContext,
    config: ValidatorConfig,
    counter: AtomicUsize,
    registered: Mutex<Vec<TableReference>>,
}

impl std::fmt::Debug for DatabaseValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseValidator")
            .field("connection", &self.connection)
            .field("database_type", &self.database.database_type())
            .field("config", &self.config)
            .finish()
    }
}

impl DatabaseValidator {
    /// Connects to the database named by a connection URL.
    ///
    /// See [`crate::connection`] for the accepted URL forms.
    pub async fn connect(connection_string: &str) -> Result<Self> {
        Self::connect_with_config(connection_string, ValidatorConfig::default()).await
    }

    /// Connects with a custom configuration.
    #[instrument(skip(connection_string, config))]
    pub async fn connect_with_config(
        connection_string: &str,
        config: ValidatorConfig,
    ) -> Result<Self> {
        let connection = ConnectionString::parse(connection_string)?;
        if !connection.config().is_enabled() {
            return Err(ExpectationsError::NotSupported(format!(
                "{} support is not enabled in this build",
                connection.database_type()
            )));
        }

        let ctx = config.build_session()?;
        info!(
            connection = %connection.redacted(),
            datasource = %connection.datasource_name(),
            db_type = %connection.database_type(),
            "Connected database validator"
        );

        Ok(Self {
            database: connection.config().clone(),
            connection: Some(connection),
            ctx,
            config,
            counter: AtomicUsize::new(0),
            registered: Mutex::new(Vec::new()),
        })
    }

    /// Creates a validator over tables already registered in a session.
    pub fn from_session(ctx: SessionContext) -> Self {
        Self::from_session_with_config(ctx, ValidatorConfig::default())
    }

    /// Creates a validator over a session with a custom configuration.
    pub fn from_session_with_config(ctx: SessionContext, config: ValidatorConfig) -> Self {
        Self {
            connection: None,
            database: DatabaseConfig::Memory,
            ctx,
            config,
            counter: AtomicUsize::new(0),
            registered: Mutex::new(Vec::new()),
        }
    }

    /// Returns the underlying DataFusion session.
    pub fn session(&self) -> &SessionContext {
        &self.ctx
    }

    /// Returns the validator configuration.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Returns the parsed connection string, if the validator was connected by URL.
    pub fn connection(&self) -> Option<&ConnectionString> {
        self.connection.as_ref()
    }

    /// Returns the names the validator has registered and not yet released.
    pub fn registered_tables(&self) -> Result<Vec<String>> {
        Ok(self
            .lock_registered()?
            .iter()
            .map(ToString::to_string)
            .collect())
    }

    /// Validates a table against a list of expectations.
    ///
    /// The table is exposed as `<table>_asset_<n>` while the expectations run
    /// and released afterwards, together with any connection pool behind it.
    #[instrument(skip(self, expectations), fields(table = %table_name, expectations = expectations.len()))]
    pub async fn validate_table(
        &self,
        table_name: &str,
        suite_name: Option<&str>,
        expectations: &[ExpectationConfig],
    ) -> Result<ValidationResult> {
        SqlSecurity::validate_identifier(table_name)?;
        let n = self.next_id();
        let asset_name = format!("{}_asset_{n}", table_name.replace('.', "_"));
        let suite_name = suite_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("{table_name}_suite_{n}"));

        let table = SqlSecurity::table_reference(table_name)?;
        let asset = SqlSecurity::table_reference(&asset_name)?;
        if self.ctx.table_exist(table.clone())? {
            let provider = self.ctx.table_provider(table).await?;
            self.ctx.register_table(asset.clone(), provider)?;
        } else {
            DatabaseSource::new(self.database.clone(), table_name)?
                .register(&self.ctx, &asset_name)
                .await?;
        }
        self.track(asset.clone())?;

        let result =
            run_expectations(&self.ctx, &self.config, &suite_name, &asset_name, expectations).await;
        if let Err(e) = self.release(&asset) {
            warn!(asset.name = %asset_name, error = %e, "Failed to release table asset");
        }
        result
    }

    /// Validates the result of a query against a list of expectations.
    ///
    /// Tables referenced by the query are registered from the database, and
    /// the query is registered as a view named after the asset. An existing
    /// asset of the same name is replaced only if this validator registered
    /// it; any other table with that name is left alone and an error returned.
    #[instrument(skip(self, query, expectations), fields(query = %truncate_field(query, 256), expectations = expectations.len()))]
    pub async fn validate_query(
        &self,
        query: &str,
        expectations: &[ExpectationConfig],
        asset_name: Option<&str>,
        suite_name: Option<&str>,
    ) -> Result<ValidationResult> {
        self.prepare_query(query).await?;

        let n = self.next_id();
        let asset_name = asset_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("query_asset_{n}"));
        let suite_name = suite_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("query_suite_{n}"));

        let asset = SqlSecurity::table_reference(&asset_name)?;
        let replacing = self.ctx.table_exist(asset.clone())?;
        if replacing && !self.lock_registered()?.contains(&asset) {
            return Err(ExpectationsError::Configuration(format!(
                "Asset name '{asset_name}' is already used by a table this validator did not register"
            )));
        }

        let view = self.ctx.sql(query).await?.into_view();
        if replacing {
            debug!(asset.name = %asset_name, "Replacing existing query asset");
            self.ctx.deregister_table(asset.clone())?;
        }
        self.ctx.register_table(asset.clone(), view)?;
        self.track(asset)?;

        run_expectations(&self.ctx, &self.config, &suite_name, &asset_name, expectations).await
    }

    /// Returns the columns of a table.
    #[instrument(skip(self))]
    pub async fn get_table_info(&self, table_name: &str) -> Result<TableInfo> {
        let table = SqlSecurity::table_reference(table_name)?;
        let schema = if self.ctx.table_exist(table.clone())? {
            self.ctx.table_provider(table).await?.schema()
        } else {
            DatabaseSource::new(self.database.clone(), table_name)?
                .table_provider()
                .await?
                .schema()
        };

        Ok(TableInfo {
            name: table_name.to_string(),
            columns: schema
                .fields()
                .iter()
                .map(|field| ColumnInfo {
                    name: field.name().clone(),
                    data_type: field.data_type().to_string(),
                    nullable: field.is_nullable(),
                })
                .collect(),
        })
    }

    /// Runs an ad-hoc query and returns its result.
    #[instrument(skip(self, sql), fields(query = %truncate_field(sql, 256)))]
    pub async fn query(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        self.prepare_query(sql).await?;
        Ok(self.ctx.sql(sql).await?.collect().await?)
    }

    /// Returns the number of rows in a table.
    #[instrument(skip(self))]
    pub async fn get_row_count(&self, table_name: &str) -> Result<u64> {
        let table = SqlSecurity::table_reference(table_name)?;
        self.ensure_registered(&table).await?;

        let sql = format!(
            "SELECT COUNT(*) AS row_count FROM {}",
            SqlSecurity::escape_identifier(table_name)?
        );
        let batches = self.ctx.sql(&sql).await?.collect().await?;
        let value = crate::constraints::first_row_value(&batches, 0)?;
        crate::constraints::scalar_to_u64(&value)
    }

    /// Releases every table the validator registered.
    ///
    /// Safe to call more than once.
    pub async fn close(&self) -> Result<()> {
        let released = self.release_tables()?;
        info!(tables.released = released, "Closed database validator");
        Ok(())
    }

    fn next_id(&self) -> usize {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn lock_registered(&self) -> Result<std::sync::MutexGuard<'_, Vec<TableReference>>> {
        self.registered
            .lock()
            .map_err(|_| ExpectationsError::Internal("Table registry lock poisoned".to_string()))
    }

    fn track(&self, table: TableReference) -> Result<()> {
        let mut registered = self.lock_registered()?;
        if !registered.contains(&table) {
            registered.push(table);
        }
        Ok(())
    }

    fn release(&self, table: &TableReference) -> Result<()> {
        self.lock_registered()?.retain(|t| t != table);
        self.ctx.deregister_table(table.clone())?;
        debug!(table = %table, "Released table");
        Ok(())
    }

    fn release_tables(&self) -> Result<usize> {
        let tables: Vec<TableReference> = self.lock_registered()?.drain(..).collect();
        for table in &tables {
            if let Err(e) = self.ctx.deregister_table(table.clone()) {
                warn!(table = %table, error = %e, "Failed to deregister table");
            }
        }
        Ok(tables.len())
    }

    /// Checks that `sql` is a single query and registers the tables it reads.
    async fn prepare_query(&self, sql: &str) -> Result<()> {
        SqlSecurity::validate_query_text(sql)?;

        let mut statements = DFParser::parse_sql(sql).map_err(DataFusionError::from)?;
        let statement = match (statements.pop_front(), statements.is_empty()) {
            (Some(statement), true) => statement,
            _ => {
                return Err(ExpectationsError::SecurityError(
                    "Validation query must be a single statement".to_string(),
                ))
            }
        };
        if !matches!(&statement, DFStatement::Statement(s) if matches!(s.as_ref(), SqlStatement::Query(_)))
        {
            return Err(ExpectationsError::SecurityError(
                "Validation query must be a read-only SELECT".to_string(),
            ));
        }

        let (tables, _ctes) = resolve_table_references(&statement, true)?;
        for table in tables {
            self.ensure_registered(&table).await?;
        }
        Ok(())
    }

    /// Registers a database table under its own name unless the session already has it.
    async fn ensure_registered(&self, table: &TableReference) -> Result<()> {
        if self.ctx.table_exist(table.clone())? {
            return Ok(());
        }
        if matches!(self.database, DatabaseConfig::Memory) {
            return Err(ExpectationsError::TableNotFound {
                table: table.to_string(),
            });
        }

        self.ensure_schema(table)?;
        let name = table.to_string();
        DatabaseSource::new(self.database.clone(), name.as_str())?
            .register(&self.ctx, &name)
            .await?;
        self.track(table.clone())
    }

    fn ensure_schema(&self, table: &TableReference) -> Result<()> {
        let Some(schema) = table.schema() else {
            return Ok(());
        };
        let catalog_name = table.catalog().map(str::to_string).unwrap_or_else(|| {
            self.ctx
                .state()
                .config_options()
                .catalog
                .default_catalog
                .clone()
        });
        let catalog = self.ctx.catalog(&catalog_name).ok_or_else(|| {
            ExpectationsError::Configuration(format!("Unknown catalog '{catalog_name}'"))
        })?;
        if catalog.schema(schema).is_none() {
            debug!(schema = %schema, "Registering schema for database tables");
            catalog.register_schema(schema, Arc::new(MemorySchemaProvider::new()))?;
        }
        Ok(())
    }
}

impl Drop for DatabaseValidator {
    fn drop(&mut self) {
        if let Err(e) = self.release_tables() {
            warn!(error = %e, "Failed to release tables on drop");
        }
    }
}

#[async_trait]
impl Validate for DatabaseValidator {
    async fn validate_table(
        &self,
        table_name: &str,
        suite_name: Option<&str>,
        expectations: &[ExpectationConfig],
    ) -> Result<ValidationResult> {
        DatabaseValidator::validate_table(self, table_name, suite_name, expectations).await
    }

    async fn validate_query(
        &self,
        query: &str,
        expectations: &[ExpectationConfig],
        asset_name: Option<&str>,
        suite_name: Option<&str>,
    ) -> Result<ValidationResult> {
        DatabaseValidator::validate_query(self, query, expectations, asset_name, suite_name).await
    }
}
