// Migration driver and statement synthesis
pub mod ddl;
pub mod driver;
pub mod type_mapper;


use crate::catalog::{CatalogReader, SqliteCatalog};
use crate::config::MigrationConfig;
use crate::dialect::SqlDialect;
use crate::error::Result;
use crate::report::MigrationReport;
use crate::target::PostgresExecutor;
use crate::types::TableDescriptor;
use tracing::{error, info};

pub use ddl::StatementBuilder;
pub use driver::{MigrationOptions, Migrator};
pub use type_mapper::TypeMapper;

/// DDL that a migration would issue for one table
#[derive(Debug, Clone)]
pub struct TablePlan {
    pub table: TableDescriptor,
    pub create_sql: String,
    /// `None` when no INSERT can be built, e.g. for a table without columns
    pub insert_sql: Option<String>,
}

/// Run a full migration with the given configuration.
///
/// Failing to open either database is fatal and returned as an error before
/// any table is touched. Once both are open, per-table failures only show up
/// in the report, and both connections are closed before returning.
pub async fn run_migration(config: &MigrationConfig) -> Result<MigrationReport> {
    config.validate()?;

    let mut reader = SqliteCatalog::open(&config.source_path).map_err(|e| {
        error!("Error connecting to source database: {}", e);
        e
    })?;
    info!("Connected to SQLite database {}", config.source_path.display());

    let target = match PostgresExecutor::connect(&config.target_pg_config(), config.pipeline_depth).await {
        Ok(target) => target,
        Err(e) => {
            error!("Error connecting to target database {}: {}", config.target_display(), e);
            reader.close().await;
            return Err(e);
        }
    };
    info!("Connected to PostgreSQL database {}", config.target_display());

    let mut migrator = Migrator::new(reader, target, MigrationOptions::from_config(config));
    let report = migrator.run().await;
    migrator.close().await;
    Ok(report)
}

/// Describe every source table and build the statements `run` would issue,
/// without touching a target.
pub async fn plan_migration<R: CatalogReader>(
    reader: &mut R,
    dialect: &dyn SqlDialect,
    type_mapper: &TypeMapper,
) -> Result<Vec<TablePlan>> {
    let builder = StatementBuilder::new(dialect, type_mapper);
    let mut plans = Vec::new();

    for name in reader.list_tables().await? {
        let table = reader.describe_table(&name).await?;
        let create_sql = builder.create_table(&table.name, &table.columns)?;
        let insert_sql = builder.insert(&table.name, table.columns.len()).ok();
        plans.push(TablePlan {
            table,
            create_sql,
            insert_sql,
        });
    }

    Ok(plans)
}
