// SQLite implementation of the catalog reader
use super::CatalogReader;
use crate::dialect::{SqlDialect, SqliteDialect};
use crate::error::{MigrateError, Result};
use crate::types::{ColumnDescriptor, Row, SqlValue};
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LIST_TABLES_SQL: &str = "SELECT name FROM sqlite_master WHERE type = 'table'";
const DESCRIBE_COLUMNS_SQL: &str = "SELECT name, type FROM pragma_table_info(?1) ORDER BY cid";

/// The path as a plain file name, never a `file:` URI.
///
/// SQLite builds with URI support enabled parse any name starting with
/// `file:`, so such relative paths are anchored at the current directory.
fn literal_path(path: &Path) -> PathBuf {
    if path.is_relative() && path.to_string_lossy().starts_with("file:") {
        Path::new(".").join(path)
    } else {
        path.to_path_buf()
    }
}

/// Read-only catalog over a SQLite database file
pub struct SqliteCatalog {
    path: PathBuf,
    conn: Option<Connection>,
}

impl SqliteCatalog {
    /// Open an existing database file read-only.
    ///
    /// A missing or unreadable file is a connection error; the file is never
    /// created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let database = format!("sqlite:{}", path.display());

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(literal_path(&path), flags)
            .map_err(|e| MigrateError::connection(&database, e))?;

        // SQLite opens lazily; touch the schema so a non-database file fails here.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .map_err(|e| MigrateError::connection(&database, e))?;

        Ok(Self {
            path,
            conn: Some(conn),
        })
    }

    /// Wrap an already open connection
    pub fn from_connection(conn: Connection) -> Self {
        let path = conn
            .path()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(":memory:"));
        Self {
            path,
            conn: Some(conn),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(MigrateError::SourceUnavailable)
    }

    fn read_table_names(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(LIST_TABLES_SQL)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    fn read_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(DESCRIBE_COLUMNS_SQL)?;
        let columns = stmt
            .query_map([table], |row| {
                let name: String = row.get(0)?;
                let declared_type: Option<String> = row.get(1)?;
                Ok(ColumnDescriptor::new(name, declared_type.unwrap_or_default()))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("Described {} columns for table {}", columns.len(), table);
        Ok(columns)
    }

    fn read_rows(&self, table: &str, columns: &[ColumnDescriptor]) -> Result<Vec<Row>> {
        let conn = self.connection()?;
        if columns.is_empty() {
            return Err(MigrateError::transfer(table, "no columns to select"));
        }

        let dialect = SqliteDialect;
        let select_list = columns
            .iter()
            .map(|c| dialect.quote_identifier(&c.name))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {}",
            select_list,
            dialect.quote_identifier(table)?
        );

        let width = columns.len();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, Value>(i).map(SqlValue::from))
                    .collect::<rusqlite::Result<Row>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[async_trait]
impl CatalogReader for SqliteCatalog {
    async fn list_tables(&mut self) -> Result<Vec<String>> {
        self.read_table_names()
    }

    async fn describe_columns(&mut self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        self.read_columns(table)
    }

    async fn fetch_rows(&mut self, table: &str, columns: &[ColumnDescriptor]) -> Result<Vec<Row>> {
        self.read_rows(table, columns)
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                warn!("Error closing SQLite database {}: {}", self.path.display(), e);
            }
        }
    }
}
