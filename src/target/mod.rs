// Target server access: DDL execution and batched inserts
pub mod postgres;
pub mod value;

use crate::dialect::SqlDialect;
use crate::error::Result;
use crate::types::Row;
use async_trait::async_trait;

pub use postgres::PostgresExecutor;

/// Executes statements against the target database
#[async_trait]
pub trait TargetExecutor: Send {
    /// SQL dialect used to build statements for this target
    fn dialect(&self) -> &dyn SqlDialect;

    /// Run a single statement in its own implicit transaction
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Run the parameterized `sql` once per row inside one transaction and
    /// commit it as a unit. Returns the number of rows affected.
    async fn execute_batch(&mut self, sql: &str, rows: &[Row]) -> Result<u64>;

    /// Release the connection
    async fn close(&mut self);
}
