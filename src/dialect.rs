//! Identifier quoting and parameter placeholders per SQL dialect.
//!
//! Identifiers (table and column names) cannot be bound as parameters, so they
//! are validated and quoted here. Values never go through this module; they are
//! always sent as bound parameters.

use crate::error::{MigrateError, Result};

/// PostgreSQL truncates identifiers at 63 bytes; SQLite has no limit.
/// Use a conservative shared bound.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// SQL syntax that differs between engines
pub trait SqlDialect: Send + Sync {
    /// Quote and escape an identifier for use in generated SQL
    fn quote_identifier(&self, ident: &str) -> Result<String>;

    /// Bind placeholder for the 1-based parameter `index`
    fn placeholder(&self, index: usize) -> String;
}

/// Reject identifiers that cannot be safely quoted
pub fn validate_identifier(ident: &str) -> Result<()> {
    if ident.is_empty() {
        return Err(MigrateError::Identifier("identifier cannot be empty".to_string()));
    }
    if ident.contains('\0') {
        return Err(MigrateError::Identifier(format!(
            "identifier contains a null byte: {:?}",
            ident
        )));
    }
    if ident.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Identifier(format!(
            "identifier exceeds {} bytes: {:?}",
            MAX_IDENTIFIER_LENGTH, ident
        )));
    }
    Ok(())
}

fn quote_double(ident: &str) -> Result<String> {
    validate_identifier(ident)?;
    Ok(format!("\"{}\"", ident.replace('"', "\"\"")))
}

/// PostgreSQL: `"name"` identifiers and `$n` placeholders
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn quote_identifier(&self, ident: &str) -> Result<String> {
        quote_double(ident)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }
}

/// SQLite: `"name"` identifiers and `?n` placeholders
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn quote_identifier(&self, ident: &str) -> Result<String> {
        quote_double(ident)
    }

    fn placeholder(&self, index: usize) -> String {
        format!("?{}", index)
    }
}
