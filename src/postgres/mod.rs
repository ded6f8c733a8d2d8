// ABOUTME: PostgreSQL driver behind the Database trait
// ABOUTME: Reads tables through tokio-postgres and writes with a cached prepared INSERT

pub mod connection;
pub mod converter;

use crate::config::ConnectionParams;
use crate::database::{CatalogEntry, Database, InsertStatement, Vendor};
use crate::value::{ColumnValue, Row};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Statement};

pub use connection::connect_client;

/// A single PostgreSQL connection
pub struct PostgresDatabase {
    client: Client,
    label: String,
    in_transaction: bool,
    /// Prepared INSERT for the table currently being imported
    prepared: Option<(String, Statement)>,
}

pub async fn connect(params: &ConnectionParams) -> Result<PostgresDatabase> {
    let client = connect_client(params).await?;
    Ok(PostgresDatabase {
        client,
        label: params.endpoint(),
        in_transaction: false,
        prepared: None,
    })
}

impl PostgresDatabase {
    async fn prepare_insert(&mut self, sql: &str) -> Result<Statement> {
        if let Some((cached_sql, statement)) = &self.prepared {
            if cached_sql == sql {
                return Ok(statement.clone());
            }
        }

        let statement = self
            .client
            .prepare(sql)
            .await
            .with_context(|| format!("Failed to prepare statement: {}", sql))?;
        self.prepared = Some((sql.to_string(), statement.clone()));
        Ok(statement)
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    fn vendor(&self) -> Vendor {
        Vendor::Postgres
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    async fn base_tables(&mut self) -> Result<Vec<CatalogEntry>> {
        let rows = self
            .client
            .query(
                "SELECT schemaname, tablename FROM pg_catalog.pg_tables \
                 ORDER BY schemaname <> 'public', schemaname, tablename",
                &[],
            )
            .await
            .context("Failed to query pg_catalog.pg_tables")?;

        Ok(rows
            .iter()
            .map(|row| CatalogEntry::new(row.get::<_, String>(0), row.get::<_, String>(1)))
            .collect())
    }

    async fn select_all(&mut self, table: &str) -> Result<Vec<Row>> {
        let sql = format!("SELECT * FROM {}", Vendor::Postgres.quote_table(table));
        let rows = self
            .client
            .query(sql.as_str(), &[])
            .await
            .with_context(|| format!("Failed to select rows from '{}'", table))?;

        let mut converted = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut neutral = Row::with_capacity(row.len());
            for (index, column) in row.columns().iter().enumerate() {
                let value = converter::to_neutral(row, index)
                    .with_context(|| format!("Failed to convert column '{}'", column.name()))?;
                neutral.push(column.name(), value);
            }
            converted.push(neutral);
        }
        Ok(converted)
    }

    async fn count_rows(&mut self, table: &str) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}",
            Vendor::Postgres.quote_table(table)
        );
        let row = self
            .client
            .query_one(sql.as_str(), &[])
            .await
            .with_context(|| format!("Failed to count rows in '{}'", table))?;
        Ok(row.get::<_, i64>(0))
    }

    async fn begin(&mut self) -> Result<()> {
        self.client
            .batch_execute("BEGIN")
            .await
            .context("Failed to start transaction")?;
        self.in_transaction = true;
        Ok(())
    }

    async fn execute_batch(
        &mut self,
        statement: &InsertStatement,
        rows: &[Vec<ColumnValue>],
    ) -> Result<()> {
        let prepared = self.prepare_insert(&statement.sql).await?;
        let param_types = prepared.params().to_vec();

        for (row_index, row) in rows.iter().enumerate() {
            let params = row
                .iter()
                .zip(&param_types)
                .zip(&statement.columns)
                .map(|((value, ty), column)| {
                    converter::from_neutral(value, ty)
                        .with_context(|| format!("Cannot bind column '{}'", column))
                })
                .collect::<Result<Vec<_>>>()?;
            let refs: Vec<&(dyn ToSql + Sync)> = params
                .iter()
                .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                .collect();

            self.client
                .execute(&prepared, &refs)
                .await
                .with_context(|| {
                    format!(
                        "Failed to insert row {} of batch into '{}'",
                        row_index + 1,
                        statement.table
                    )
                })?;
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.client
            .batch_execute("COMMIT")
            .await
            .context("Failed to commit transaction")?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.in_transaction = false;
        self.client
            .batch_execute("ROLLBACK")
            .await
            .context("Failed to roll back transaction")
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn close(self: Box<Self>) -> Result<()> {
        // Dropping the client ends the spawned connection task
        drop(self.client);
        Ok(())
    }
}
