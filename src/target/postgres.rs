// PostgreSQL implementation of the target executor
use super::TargetExecutor;
use crate::dialect::{PostgresDialect, SqlDialect};
use crate::error::{MigrateError, Result};
use crate::types::Row;
use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, warn};

/// Single long-lived connection to the target server
pub struct PostgresExecutor {
    client: Option<Client>,
    connection: Option<JoinHandle<()>>,
    dialect: PostgresDialect,
    pipeline_depth: usize,
}

impl PostgresExecutor {
    /// Connect to the target server.
    ///
    /// `pipeline_depth` bounds how many INSERTs are in flight at once during
    /// `execute_batch`.
    pub async fn connect(config: &tokio_postgres::Config, pipeline_depth: usize) -> Result<Self> {
        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| MigrateError::connection("postgres", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(Self {
            client: Some(client),
            connection: Some(handle),
            dialect: PostgresDialect,
            pipeline_depth: pipeline_depth.max(1),
        })
    }

    /// Shared client, for row-count checks and other read queries
    pub fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| MigrateError::connection("postgres", "connection is closed"))
    }

    fn client_mut(&mut self) -> Result<&mut Client> {
        self.client
            .as_mut()
            .ok_or_else(|| MigrateError::connection("postgres", "connection is closed"))
    }
}

#[async_trait]
impl TargetExecutor for PostgresExecutor {
    fn dialect(&self) -> &dyn SqlDialect {
        &self.dialect
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        debug!("Executing: {}", sql);
        self.client()?.batch_execute(sql).await?;
        Ok(())
    }

    async fn execute_batch(&mut self, sql: &str, rows: &[Row]) -> Result<u64> {
        let depth = self.pipeline_depth;
        let client = self.client_mut()?;

        // Dropping the transaction on an early return rolls it back.
        let tx = client.transaction().await?;
        let statement = tx.prepare(sql).await?;

        let mut affected = 0u64;
        for chunk in rows.chunks(depth) {
            let tx = &tx;
            let statement = &statement;
            // Queries issued concurrently on one client are pipelined.
            let counts = try_join_all(chunk.iter().map(|row| async move {
                let params: Vec<&(dyn ToSql + Sync)> =
                    row.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
                tx.execute(statement, &params).await
            }))
            .await?;
            affected += counts.iter().sum::<u64>();
        }

        tx.commit().await?;
        Ok(affected)
    }

    async fn close(&mut self) {
        // Dropping the client ends the connection task.
        drop(self.client.take());
        if let Some(handle) = self.connection.take() {
            if let Err(e) = handle.await {
                warn!("PostgreSQL connection task did not shut down cleanly: {}", e);
            }
        }
    }
}
