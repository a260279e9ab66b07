use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, info, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, prelude::*};

use lite2pg::catalog::{CatalogReader, SqliteCatalog};
use lite2pg::config::{self, parse_type_overrides, ErrorPolicy, MigrationConfig};
use lite2pg::dialect::PostgresDialect;
use lite2pg::migrator::{plan_migration, run_migration, TablePlan, TypeMapper};

#[derive(Parser)]
#[command(name = "lite2pg")]
#[command(about = "Copy SQLite tables and rows into PostgreSQL")]
#[command(version)]
#[command(long_about = "lite2pg reads every table of a SQLite database, creates a matching table in PostgreSQL (CREATE TABLE IF NOT EXISTS, column types copied verbatim unless overridden) and bulk-inserts all rows, one transaction per table. Failures in one table are logged and the run continues with the next.")]
#[command(after_help = "EXAMPLES:
    # Migrate using DB_USER / DB_PASSWORD from the environment or .env
    lite2pg migrate --source my_database.db --database migration_db

    # Map SQLite types that PostgreSQL does not know
    lite2pg migrate --type-map DATETIME=TIMESTAMP --type-map =TEXT

    # Stop at the first failing table and keep a JSON report
    lite2pg migrate --error-policy fail-fast --report report.json

    # Print the DDL without touching PostgreSQL
    lite2pg plan --source my_database.db")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Set log level explicitly
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Log file, written in addition to standard output
    #[arg(long, global = true, env = "LOG_FILE", default_value = "migration.log", value_name = "FILE")]
    log_file: PathBuf,
}

#[derive(ValueEnum, Clone, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate schema and data from SQLite to PostgreSQL
    Migrate(MigrateArgs),

    /// Print the DDL a migration would issue, without connecting to PostgreSQL
    Plan(PlanArgs),
}

#[derive(Args)]
struct MigrateArgs {
    /// Path to the source SQLite database
    #[arg(short, long, env = "SQLITE_PATH", default_value = config::DEFAULT_SOURCE_PATH, value_name = "FILE")]
    source: PathBuf,

    /// PostgreSQL host
    #[arg(long, env = "DB_HOST", default_value = config::DEFAULT_TARGET_HOST)]
    host: String,

    /// PostgreSQL port
    #[arg(long, env = "DB_PORT", default_value_t = config::DEFAULT_TARGET_PORT)]
    port: u16,

    /// PostgreSQL database name
    #[arg(short, long, env = "DB_NAME", default_value = config::DEFAULT_TARGET_DB)]
    database: String,

    /// PostgreSQL user
    #[arg(short, long, env = "DB_USER")]
    user: Option<String>,

    /// PostgreSQL password
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Timeout for connecting to PostgreSQL, in seconds
    #[arg(long, default_value = "30")]
    connect_timeout: u64,

    /// What to do when a table fails
    #[arg(long, env = "ERROR_POLICY", value_enum, default_value = "best-effort")]
    error_policy: ErrorPolicy,

    /// Override declared column types (repeatable, SOURCE=TARGET[,SOURCE=TARGET...])
    #[arg(long = "type-map", env = "TYPE_MAP", value_name = "SOURCE=TARGET", value_parser = parse_type_map)]
    type_map: Vec<TypeOverrides>,

    /// INSERTs kept in flight per round of the bulk insert
    #[arg(long, default_value_t = config::DEFAULT_PIPELINE_DEPTH)]
    pipeline_depth: usize,

    /// Write a JSON report of the run
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

#[derive(Args)]
struct PlanArgs {
    /// Path to the source SQLite database
    #[arg(short, long, env = "SQLITE_PATH", default_value = config::DEFAULT_SOURCE_PATH, value_name = "FILE")]
    source: PathBuf,

    /// Override declared column types (repeatable, SOURCE=TARGET[,SOURCE=TARGET...])
    #[arg(long = "type-map", env = "TYPE_MAP", value_name = "SOURCE=TARGET", value_parser = parse_type_map)]
    type_map: Vec<TypeOverrides>,

    /// Output file (default: standard output)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

/// Overrides given by one `--type-map` occurrence
#[derive(Clone, Debug)]
struct TypeOverrides(Vec<(String, String)>);

fn parse_type_map(raw: &str) -> std::result::Result<TypeOverrides, String> {
    parse_type_overrides(raw).map(TypeOverrides)
}

fn flatten_overrides(type_map: Vec<TypeOverrides>) -> impl Iterator<Item = (String, String)> {
    type_map.into_iter().flat_map(|overrides| overrides.0)
}

impl MigrateArgs {
    fn into_config(self) -> MigrationConfig {
        MigrationConfig {
            source_path: self.source,
            target_host: self.host,
            target_port: self.port,
            target_db: self.database,
            target_user: self.user.unwrap_or_default(),
            target_password: self.password.unwrap_or_default(),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            error_policy: self.error_policy,
            type_overrides: flatten_overrides(self.type_map).collect(),
            pipeline_depth: self.pipeline_depth,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may come from a .env file; load it before clap reads the environment.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    info!("Starting lite2pg v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Migrate(args) => {
            let report_path = args.report.clone();
            let config = args.into_config();
            info!("Configuration: {:?}", config);

            match run_migration(&config).await {
                Ok(report) => {
                    if let Some(path) = &report_path {
                        match report.write_json(path) {
                            Ok(()) => info!("Report written to {:?}", path),
                            Err(e) => error!("Failed to write report to {:?}: {}", path, e),
                        }
                    }
                    if report.aborted {
                        eprintln!("Migration aborted: {}", report.summary());
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("Migration failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Plan(args) => {
            if let Err(e) = execute_plan(args).await {
                eprintln!("Plan failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Describe the source and emit the statements a migration would run
async fn execute_plan(args: PlanArgs) -> Result<()> {
    let mut reader = SqliteCatalog::open(&args.source)
        .with_context(|| format!("opening source database {:?}", args.source))?;
    let type_mapper = TypeMapper::with_overrides(flatten_overrides(args.type_map));

    let plans = plan_migration(&mut reader, &PostgresDialect, &type_mapper).await;
    reader.close().await;
    let plans = plans?;
    let ddl = render_plan(&plans);

    match &args.output {
        Some(path) => {
            std::fs::write(path, &ddl).with_context(|| format!("writing {:?}", path))?;
            info!("DDL for {} tables written to {:?}", plans.len(), path);
        }
        None => print!("{}", ddl),
    }
    Ok(())
}

fn render_plan(plans: &[TablePlan]) -> String {
    let mut ddl = String::new();
    for plan in plans {
        ddl.push_str(&format!("-- {} ({} columns)\n", plan.table.name, plan.table.columns.len()));
        ddl.push_str(&plan.create_sql);
        ddl.push_str(";\n");
        match &plan.insert_sql {
            Some(insert) => ddl.push_str(&format!("-- {};\n\n", insert)),
            None => ddl.push_str("-- no INSERT: table has no columns\n\n"),
        }
    }
    ddl
}

/// Initialize logging to standard output and the log file
fn initialize_logging(cli: &Cli) -> Result<()> {
    let log_level = if let Some(level) = &cli.log_level {
        level.clone().into()
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cli.log_file)
        .with_context(|| format!("opening log file {:?}", cli.log_file))?;

    log_subscriber(log_level, cli.json_logs, cli.verbose, Mutex::new(file)).init();
    Ok(())
}

/// Subscriber that writes every event to standard output and to `file_writer`
fn log_subscriber<W>(
    log_level: Level,
    json_logs: bool,
    verbose: bool,
    file_writer: W,
) -> Box<dyn Subscriber + Send + Sync>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = LevelFilter::from_level(log_level);

    if json_logs {
        Box::new(
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false).with_writer(std::io::stdout))
                .with(
                    fmt::layer()
                        .json()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(file_writer),
                ),
        )
    } else {
        Box::new(
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_ids(verbose)
                        .with_file(verbose)
                        .with_line_number(verbose)
                        .with_writer(std::io::stdout),
                )
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(file_writer),
                ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::Arc;
    use tracing::{debug, error};

    /// In-memory log sink shared between the subscriber and the test
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for SharedBuffer {
        type Writer = SharedBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn emit_sample_events(subscriber: Box<dyn Subscriber + Send + Sync>) {
        tracing::subscriber::with_default(subscriber, || {
            debug!("row batch prepared");
            error!(table = %"orders", "Error creating table in target: type \"money2\" does not exist");
        });
    }

    #[test]
    fn test_file_log_lines_carry_timestamp_level_and_table() {
        let sink = SharedBuffer::default();
        emit_sample_events(log_subscriber(Level::INFO, false, false, sink.clone()));

        let output = sink.contents();
        assert!(!output.contains("row batch prepared"));
        let line = output
            .lines()
            .find(|line| line.contains("Error creating table"))
            .expect("error event in log file");
        let timestamp = line.split_whitespace().next().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok(), "{}", line);
        assert!(line.contains("ERROR"));
        assert!(line.contains("table=orders"));
        assert!(!line.contains('\u{1b}'));
    }

    #[test]
    fn test_json_log_lines_in_file() {
        let sink = SharedBuffer::default();
        emit_sample_events(log_subscriber(Level::DEBUG, true, false, sink.clone()));

        let events: Vec<serde_json::Value> = sink
            .contents()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["level"], "DEBUG");

        let error_event = &events[1];
        assert_eq!(error_event["level"], "ERROR");
        assert_eq!(error_event["fields"]["table"], "orders");
        let timestamp = error_event["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[test]
    fn test_type_map_accepts_parameterized_types() {
        let cli = Cli::try_parse_from([
            "lite2pg",
            "migrate",
            "--user",
            "postgres",
            "--type-map",
            "DECIMAL(10,2)=DOUBLE PRECISION",
            "--type-map",
            "DATETIME=TIMESTAMP,=TEXT",
        ])
        .unwrap();
        let Commands::Migrate(args) = cli.command else {
            panic!("expected the migrate command");
        };

        let overrides = args.into_config().type_overrides;
        assert_eq!(overrides.len(), 3);
        assert_eq!(overrides["DECIMAL(10,2)"], "DOUBLE PRECISION");
        assert_eq!(overrides["DATETIME"], "TIMESTAMP");
        assert_eq!(overrides[""], "TEXT");
    }

    #[test]
    fn test_type_map_rejects_malformed_entry() {
        let result = Cli::try_parse_from(["lite2pg", "plan", "--type-map", "DATETIME"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_plan_writes_ddl_for_each_table() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.db");
        let conn = rusqlite::Connection::open(&source).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER, price DECIMAL(10,2));
             CREATE TABLE notes (body);",
        )
        .unwrap();
        drop(conn);
        let output = dir.path().join("plan.sql");

        let cli = Cli::try_parse_from([
            "lite2pg",
            "plan",
            "--source",
            source.to_str().unwrap(),
            "--type-map",
            "DECIMAL(10,2)=NUMERIC(10,2),=TEXT",
            "--output",
            output.to_str().unwrap(),
        ])
        .unwrap();
        let Commands::Plan(args) = cli.command else {
            panic!("expected the plan command");
        };
        execute_plan(args).await.unwrap();

        let ddl = std::fs::read_to_string(&output).unwrap();
        assert_eq!(
            ddl,
            "-- users (2 columns)\n\
             CREATE TABLE IF NOT EXISTS \"users\" (\"id\" INTEGER, \"price\" NUMERIC(10,2));\n\
             -- INSERT INTO \"users\" VALUES ($1, $2);\n\n\
             -- notes (1 columns)\n\
             CREATE TABLE IF NOT EXISTS \"notes\" (\"body\" TEXT);\n\
             -- INSERT INTO \"notes\" VALUES ($1);\n\n"
        );
    }

    #[test]
    fn test_render_plan_marks_column_less_tables() {
        let plan = TablePlan {
            table: lite2pg::types::TableDescriptor::new("empty", Vec::new()),
            create_sql: "CREATE TABLE IF NOT EXISTS \"empty\" ()".to_string(),
            insert_sql: None,
        };
        assert_eq!(
            render_plan(&[plan]),
            "-- empty (0 columns)\nCREATE TABLE IF NOT EXISTS \"empty\" ();\n-- no INSERT: table has no columns\n\n"
        );
    }
}
