// Per-table migration: introspect, create, transfer
use super::ddl::StatementBuilder;
use super::type_mapper::TypeMapper;
use crate::catalog::CatalogReader;
use crate::config::{ErrorPolicy, MigrationConfig};
use crate::error::{MigrateError, Result};
use crate::report::{MigrationReport, TableOutcome};
use crate::target::TargetExecutor;
use crate::types::{ColumnDescriptor, Row};
use std::time::Instant;
use tracing::{error, info, warn};

/// Behaviour knobs for a migrator
#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    pub error_policy: ErrorPolicy,
    pub type_mapper: TypeMapper,
}

impl MigrationOptions {
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            error_policy: config.error_policy,
            type_mapper: TypeMapper::with_overrides(
                config.type_overrides.iter().map(|(k, v)| (k, v.clone())),
            ),
        }
    }
}

/// Migration context: the source reader, the target executor and the
/// options they are driven with. Tables are processed one at a time.
pub struct Migrator<R, T> {
    reader: R,
    target: T,
    options: MigrationOptions,
}

impl<R: CatalogReader, T: TargetExecutor> Migrator<R, T> {
    pub fn new(reader: R, target: T, options: MigrationOptions) -> Self {
        Self {
            reader,
            target,
            options,
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn into_parts(self) -> (R, T) {
        (self.reader, self.target)
    }

    /// Migrate every source table in catalog order.
    ///
    /// Per-table failures are recorded in the report. Under
    /// [`ErrorPolicy::FailFast`] the first failure marks the report aborted
    /// and stops the loop.
    pub async fn run(&mut self) -> MigrationReport {
        let mut report = MigrationReport::new();

        let tables = match self.reader.list_tables().await {
            Ok(tables) => tables,
            Err(e) => {
                error!("Error during migration: failed to list source tables: {}", e);
                report.listing_error = Some(e.to_string());
                report.aborted = self.options.error_policy.is_fail_fast();
                report.finish();
                return report;
            }
        };
        info!("Found {} tables in source: {:?}", tables.len(), tables);

        for table in &tables {
            let outcome = self.migrate_table(table).await;
            let failed = !outcome.is_success();
            report.record(outcome);

            if failed && self.options.error_policy.is_fail_fast() {
                error!(table = %table, "Stopping migration after first failure (fail-fast)");
                report.aborted = true;
                break;
            }
        }

        report.finish();
        info!(run_id = %report.run_id, "Migration finished: {}", report.summary());
        report
    }

    /// Create `table` on the target if it does not exist yet.
    ///
    /// An existing table is left untouched; its columns are not reconciled.
    /// Failures are logged here and returned for the caller to record.
    pub async fn create_target_table(&mut self, table: &str, columns: &[ColumnDescriptor]) -> Result<()> {
        let sql = StatementBuilder::new(self.target.dialect(), &self.options.type_mapper)
            .create_table(table, columns);

        let result = match sql {
            Ok(sql) => self.target.execute(&sql).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!("Created table {} in target", table);
                Ok(())
            }
            Err(e) => {
                error!(table = %table, "Error creating table {} in target: {}", table, e);
                Err(MigrateError::schema(table, e))
            }
        }
    }

    /// Migrate one table: describe, create, read all rows, bulk insert.
    ///
    /// Under best effort a failed CREATE still lets the row transfer run.
    /// Nothing here aborts the run; the outcome records what failed.
    pub async fn migrate_table(&mut self, table: &str) -> TableOutcome {
        let started = Instant::now();
        let mut outcome = TableOutcome::new(table);

        let columns = match self.reader.describe_columns(table).await {
            Ok(columns) => columns,
            Err(e) => {
                let e = in_table(table, e);
                error!(table = %table, "Error migrating table {}: {}", table, e);
                outcome.transfer_error = Some(e.to_string());
                outcome.duration_ms = started.elapsed().as_millis() as u64;
                return outcome;
            }
        };
        outcome.columns = columns.len();
        if columns.is_empty() {
            warn!(table = %table, "Table {} has no columns", table);
        }

        if let Err(e) = self.create_target_table(table, &columns).await {
            outcome.schema_error = Some(e.to_string());
            if self.options.error_policy.is_fail_fast() {
                outcome.duration_ms = started.elapsed().as_millis() as u64;
                return outcome;
            }
        }

        match self.transfer_rows(table, &columns, &mut outcome).await {
            Ok(written) => {
                outcome.rows_written = written;
                outcome.duration_ms = started.elapsed().as_millis() as u64;
                let rows_per_sec = outcome.throughput().unwrap_or_default();
                info!(
                    table = %table,
                    rows = written,
                    duration_ms = outcome.duration_ms,
                    rows_per_sec,
                    "Migrated table {} ({} rows, {:.1} rows/s)", table, written, rows_per_sec
                );
            }
            Err(e) => {
                let e = in_table(table, e);
                error!(table = %table, "Error migrating table {}: {}", table, e);
                outcome.transfer_error = Some(e.to_string());
            }
        }

        outcome.duration_ms = started.elapsed().as_millis() as u64;
        outcome
    }

    async fn transfer_rows(
        &mut self,
        table: &str,
        columns: &[ColumnDescriptor],
        outcome: &mut TableOutcome,
    ) -> Result<u64> {
        let rows = self.reader.fetch_rows(table, columns).await?;
        outcome.rows_read = rows.len();

        let insert_sql = StatementBuilder::new(self.target.dialect(), &self.options.type_mapper)
            .insert(table, columns.len())?;
        check_row_shape(table, columns.len(), &rows)?;

        self.target.execute_batch(&insert_sql, &rows).await
    }

    /// Close both connections
    pub async fn close(&mut self) {
        self.reader.close().await;
        self.target.close().await;
        info!("Closed database connections.");
    }
}

/// Every row must have exactly one value per column, or values would land in
/// the wrong columns.
fn check_row_shape(table: &str, width: usize, rows: &[Row]) -> Result<()> {
    match rows.iter().position(|row| row.len() != width) {
        Some(index) => Err(MigrateError::transfer(
            table,
            format!(
                "row {} has {} values but the table has {} columns",
                index,
                rows[index].len(),
                width
            ),
        )),
        None => Ok(()),
    }
}

/// Attribute an error to `table` unless it already names one
fn in_table(table: &str, e: MigrateError) -> MigrateError {
    match e {
        MigrateError::Schema { .. } | MigrateError::DataTransfer { .. } => e,
        other => MigrateError::transfer(table, other),
    }
}
