// Per-run and per-table migration outcomes
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Final state of one table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableStatus {
    /// Created (or already present) and every row transferred
    Migrated,
    /// Table creation failed but the row transfer went through
    SchemaFailed,
    /// Row transfer failed
    TransferFailed,
}

/// What happened to one table during the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableOutcome {
    pub table: String,
    pub columns: usize,
    pub rows_read: usize,
    pub rows_written: u64,
    pub schema_error: Option<String>,
    pub transfer_error: Option<String>,
    pub duration_ms: u64,
}

impl TableOutcome {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: 0,
            rows_read: 0,
            rows_written: 0,
            schema_error: None,
            transfer_error: None,
            duration_ms: 0,
        }
    }

    pub fn status(&self) -> TableStatus {
        if self.transfer_error.is_some() {
            TableStatus::TransferFailed
        } else if self.schema_error.is_some() {
            TableStatus::SchemaFailed
        } else {
            TableStatus::Migrated
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == TableStatus::Migrated
    }

    /// Rows per second, when the table took measurable time
    pub fn throughput(&self) -> Option<f64> {
        (self.duration_ms > 0).then(|| self.rows_written as f64 * 1000.0 / self.duration_ms as f64)
    }
}

/// Outcome of a whole migration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set when the table listing itself failed
    pub listing_error: Option<String>,
    /// Set when a fail-fast policy stopped the run early
    pub aborted: bool,
    pub tables: Vec<TableOutcome>,
}

impl MigrationReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            listing_error: None,
            aborted: false,
            tables: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: TableOutcome) {
        self.tables.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn succeeded(&self) -> usize {
        self.tables.iter().filter(|t| t.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.tables.len() - self.succeeded()
    }

    pub fn total_rows_written(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_written).sum()
    }

    pub fn is_successful(&self) -> bool {
        self.listing_error.is_none() && !self.aborted && self.failed() == 0
    }

    pub fn outcome(&self, table: &str) -> Option<&TableOutcome> {
        self.tables.iter().find(|t| t.table == table)
    }

    pub fn summary(&self) -> String {
        let elapsed_ms = self
            .finished_at
            .map(|end| end.signed_duration_since(self.started_at).num_milliseconds())
            .unwrap_or(0);
        format!(
            "{} tables processed, {} migrated, {} with errors, {} rows written in {} ms{}",
            self.tables.len(),
            self.succeeded(),
            self.failed(),
            self.total_rows_written(),
            elapsed_ms,
            if self.aborted { " (aborted)" } else { "" }
        )
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl Default for MigrationReport {
    fn default() -> Self {
        Self::new()
    }
}
