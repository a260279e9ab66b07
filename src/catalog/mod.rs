// Source catalog access: table listing, column introspection and row reads
pub mod sqlite;

#[cfg(test)]
mod tests;

use crate::error::Result;
use crate::types::{ColumnDescriptor, Row, TableDescriptor};
use async_trait::async_trait;

pub use sqlite::SqliteCatalog;

/// Reads schema and data from the source database
#[async_trait]
pub trait CatalogReader: Send {
    /// All objects the source catalog reports as tables, in catalog order.
    /// Nothing is filtered out, internal tables included.
    async fn list_tables(&mut self) -> Result<Vec<String>>;

    /// Columns of `table` in ordinal order. An unknown or column-less table
    /// yields an empty list rather than an error.
    async fn describe_columns(&mut self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Every row of `table`, with values in the order of `columns`
    async fn fetch_rows(&mut self, table: &str, columns: &[ColumnDescriptor]) -> Result<Vec<Row>>;

    /// Release the connection. Later calls fail with `SourceUnavailable`.
    async fn close(&mut self);

    async fn describe_table(&mut self, table: &str) -> Result<TableDescriptor> {
        let columns = self.describe_columns(table).await?;
        Ok(TableDescriptor::new(table, columns))
    }
}
