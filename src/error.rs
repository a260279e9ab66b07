use thiserror::Error;

/// Main error type for the lite2pg system
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Connection error ({database}): {message}")]
    Connection { database: String, message: String },

    #[error("Source database is not open")]
    SourceUnavailable,

    #[error("Schema error for table {table}: {message}")]
    Schema { table: String, message: String },

    #[error("Data transfer error for table {table}: {message}")]
    DataTransfer { table: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid identifier: {0}")]
    Identifier(String),

    #[error("Source error: {0}")]
    Source(#[from] rusqlite::Error),

    #[error("Target error: {0}")]
    Target(#[from] tokio_postgres::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MigrateError>;

impl MigrateError {
    pub fn connection(database: impl Into<String>, message: impl ToString) -> Self {
        Self::Connection {
            database: database.into(),
            message: message.to_string(),
        }
    }

    pub fn schema(table: impl Into<String>, message: impl ToString) -> Self {
        Self::Schema {
            table: table.into(),
            message: message.to_string(),
        }
    }

    pub fn transfer(table: impl Into<String>, message: impl ToString) -> Self {
        Self::DataTransfer {
            table: table.into(),
            message: message.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Fatal errors abort the run before any table is processed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Config(_))
    }
}
