pub mod catalog;
pub mod config;
pub mod dialect;
pub mod error;
pub mod migrator;
pub mod report;
pub mod target;
pub mod types;

pub use config::{ErrorPolicy, MigrationConfig};
pub use error::{MigrateError, Result};
pub use migrator::{plan_migration, run_migration, MigrationOptions, Migrator};
pub use report::MigrationReport;
