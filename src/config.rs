// Run configuration for a migration
use crate::error::{MigrateError, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SOURCE_PATH: &str = "my_database.db";
pub const DEFAULT_TARGET_HOST: &str = "localhost";
pub const DEFAULT_TARGET_PORT: u16 = 5432;
pub const DEFAULT_TARGET_DB: &str = "migration_db";
pub const DEFAULT_PIPELINE_DEPTH: usize = 256;

/// What to do when a table fails to create or transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ErrorPolicy {
    /// Log the failure and continue with the next step or table
    #[default]
    BestEffort,
    /// Stop at the first failure
    FailFast,
}

impl ErrorPolicy {
    pub fn is_fail_fast(self) -> bool {
        matches!(self, ErrorPolicy::FailFast)
    }
}

/// Connection and behaviour settings for one migration run
#[derive(Clone)]
pub struct MigrationConfig {
    /// Path to the source SQLite database file
    pub source_path: PathBuf,
    pub target_host: String,
    pub target_port: u16,
    pub target_db: String,
    pub target_user: String,
    pub target_password: String,
    /// Timeout for establishing the target connection
    pub connect_timeout: Duration,
    pub error_policy: ErrorPolicy,
    /// Declared-type overrides, keyed by source type
    pub type_overrides: HashMap<String, String>,
    /// Number of INSERTs kept in flight per round of the bulk insert
    pub pipeline_depth: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from(DEFAULT_SOURCE_PATH),
            target_host: DEFAULT_TARGET_HOST.to_string(),
            target_port: DEFAULT_TARGET_PORT,
            target_db: DEFAULT_TARGET_DB.to_string(),
            target_user: String::new(),
            target_password: String::new(),
            connect_timeout: Duration::from_secs(30),
            error_policy: ErrorPolicy::default(),
            type_overrides: HashMap::new(),
            pipeline_depth: DEFAULT_PIPELINE_DEPTH,
        }
    }
}

// Keep the password out of logs.
impl fmt::Debug for MigrationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationConfig")
            .field("source_path", &self.source_path)
            .field("target_host", &self.target_host)
            .field("target_port", &self.target_port)
            .field("target_db", &self.target_db)
            .field("target_user", &self.target_user)
            .field("target_password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .field("error_policy", &self.error_policy)
            .field("type_overrides", &self.type_overrides)
            .field("pipeline_depth", &self.pipeline_depth)
            .finish()
    }
}

impl MigrationConfig {
    /// Check the settings before any connection is attempted
    pub fn validate(&self) -> Result<()> {
        if self.target_host.trim().is_empty() {
            return Err(MigrateError::config("target host must not be empty"));
        }
        if self.target_port == 0 {
            return Err(MigrateError::config("target port must be non-zero"));
        }
        if self.target_db.trim().is_empty() {
            return Err(MigrateError::config("target database name must not be empty"));
        }
        if self.target_user.trim().is_empty() {
            return Err(MigrateError::config(
                "target user must be set (DB_USER or --user)",
            ));
        }
        if self.pipeline_depth == 0 {
            return Err(MigrateError::config("pipeline depth must be at least 1"));
        }
        Ok(())
    }

    /// Build a `tokio-postgres` configuration for the target server
    pub fn target_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.target_host)
            .port(self.target_port)
            .dbname(&self.target_db)
            .user(&self.target_user)
            .password(&self.target_password)
            .connect_timeout(self.connect_timeout)
            .application_name("lite2pg");
        config
    }

    /// Short description of the target, safe to log
    pub fn target_display(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.target_user, self.target_host, self.target_port, self.target_db
        )
    }
}

/// Parse a `SOURCE=TARGET` type override.
///
/// The source side may be empty to map untyped columns.
pub fn parse_type_override(raw: &str) -> std::result::Result<(String, String), String> {
    let (source, target) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SOURCE=TARGET, got '{}'", raw))?;
    let target = target.trim();
    if target.is_empty() {
        return Err(format!("target type is empty in '{}'", raw));
    }
    Ok((source.trim().to_string(), target.to_string()))
}

/// Parse a comma-separated list of `SOURCE=TARGET` overrides.
///
/// Commas inside parentheses belong to the type, so `DECIMAL(10,2)=NUMERIC(10,2)`
/// is a single override.
pub fn parse_type_overrides(raw: &str) -> std::result::Result<Vec<(String, String)>, String> {
    let mut overrides = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                overrides.push(parse_type_override(&raw[start..i])?);
                start = i + 1;
            }
            _ => {}
        }
    }
    overrides.push(parse_type_override(&raw[start..])?);
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> MigrationConfig {
        MigrationConfig {
            target_user: "postgres".to_string(),
            target_password: "secret".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_match_fixed_constants() {
        let config = MigrationConfig::default();
        assert_eq!(config.source_path, PathBuf::from("my_database.db"));
        assert_eq!(config.target_host, "localhost");
        assert_eq!(config.target_port, 5432);
        assert_eq!(config.target_db, "migration_db");
        assert_eq!(config.error_policy, ErrorPolicy::BestEffort);
    }

    #[test]
    fn test_validate() {
        assert!(valid_config().validate().is_ok());

        let mut config = valid_config();
        config.target_user.clear();
        assert!(matches!(config.validate(), Err(MigrateError::Config(_))));

        let mut config = valid_config();
        config.target_port = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.pipeline_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", valid_config());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_parse_type_override() {
        assert_eq!(
            parse_type_override("INTEGER=BIGINT").unwrap(),
            ("INTEGER".to_string(), "BIGINT".to_string())
        );
        assert_eq!(
            parse_type_override("=TEXT").unwrap(),
            (String::new(), "TEXT".to_string())
        );
        assert!(parse_type_override("INTEGER").is_err());
        assert!(parse_type_override("INTEGER=").is_err());
    }

    #[test]
    fn test_parse_type_overrides_keeps_parameterized_types() {
        assert_eq!(
            parse_type_overrides("DECIMAL(10,2)=DOUBLE PRECISION").unwrap(),
            vec![("DECIMAL(10,2)".to_string(), "DOUBLE PRECISION".to_string())]
        );
        assert_eq!(
            parse_type_overrides("NUMERIC(12,4)=NUMERIC(12,4), DATETIME=TIMESTAMP,=TEXT").unwrap(),
            vec![
                ("NUMERIC(12,4)".to_string(), "NUMERIC(12,4)".to_string()),
                ("DATETIME".to_string(), "TIMESTAMP".to_string()),
                (String::new(), "TEXT".to_string()),
            ]
        );
        assert!(parse_type_overrides("DATETIME=TIMESTAMP,INTEGER").is_err());
    }
}
