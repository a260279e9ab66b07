// Statement synthesis for the target: CREATE TABLE and bulk INSERT
use super::type_mapper::TypeMapper;
use crate::dialect::SqlDialect;
use crate::error::{MigrateError, Result};
use crate::types::ColumnDescriptor;

/// Builds target statements for one dialect and type mapping
pub struct StatementBuilder<'a> {
    dialect: &'a dyn SqlDialect,
    type_mapper: &'a TypeMapper,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(dialect: &'a dyn SqlDialect, type_mapper: &'a TypeMapper) -> Self {
        Self {
            dialect,
            type_mapper,
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` with quoted column names and the mapped
    /// type emitted as a raw, unvalidated fragment.
    ///
    /// An empty column list still yields a statement; whether the target
    /// accepts it is up to the target.
    pub fn create_table(&self, table: &str, columns: &[ColumnDescriptor]) -> Result<String> {
        let fields = columns
            .iter()
            .map(|column| {
                let name = self.dialect.quote_identifier(&column.name)?;
                let column_type = self.type_mapper.map(&column.declared_type);
                Ok(format!("{} {}", name, column_type).trim_end().to_string())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.dialect.quote_identifier(table)?,
            fields.join(", ")
        ))
    }

    /// `INSERT INTO <table> VALUES (...)` with one placeholder per column
    pub fn insert(&self, table: &str, column_count: usize) -> Result<String> {
        if column_count == 0 {
            return Err(MigrateError::transfer(
                table,
                "cannot build an INSERT for a table without columns",
            ));
        }

        let placeholders = (1..=column_count)
            .map(|i| self.dialect.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!(
            "INSERT INTO {} VALUES ({})",
            self.dialect.quote_identifier(table)?,
            placeholders
        ))
    }
}
