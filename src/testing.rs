// ABOUTME: In-memory Database implementation for unit tests
// ABOUTME: Records transaction calls and can inject failures on chosen values or tables

use crate::database::{CatalogEntry, Database, InsertStatement, Vendor};
use crate::value::{ColumnValue, Row};
use anyhow::{bail, Result};
use async_trait::async_trait;

/// Fake database holding tables as row vectors
///
/// Rows written inside a transaction are staged and only become visible on
/// `commit`, so tests can observe exactly what each batch committed.
pub struct MemoryDatabase {
    vendor: Vendor,
    tables: Vec<(CatalogEntry, Vec<Row>)>,
    staged: Vec<(String, Row)>,
    in_transaction: bool,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    /// Executing a row that binds this value fails
    pub fail_on_value: Option<ColumnValue>,
    /// Tables whose COUNT(*) fails
    pub failing_counts: Vec<String>,
    /// Tables whose SELECT fails
    pub failing_selects: Vec<String>,
}

impl MemoryDatabase {
    pub fn new(vendor: Vendor) -> Self {
        MemoryDatabase {
            vendor,
            tables: Vec::new(),
            staged: Vec::new(),
            in_transaction: false,
            begins: 0,
            commits: 0,
            rollbacks: 0,
            fail_on_value: None,
            failing_counts: Vec::new(),
            failing_selects: Vec::new(),
        }
    }

    /// Add a table in the default schema
    pub fn with_table(self, name: &str, rows: Vec<Row>) -> Self {
        let schema = match self.vendor {
            Vendor::MySql => "app",
            Vendor::Postgres => "public",
            Vendor::Sqlite => "main",
        };
        self.with_schema_table(schema, name, rows)
    }

    pub fn with_schema_table(mut self, schema: &str, name: &str, rows: Vec<Row>) -> Self {
        self.tables.push((CatalogEntry::new(schema, name), rows));
        self
    }

    /// Committed rows of `table`
    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables
            .iter()
            .find(|(entry, _)| self.vendor.table_name(&entry.schema, &entry.name) == table)
            .map(|(_, rows)| rows.as_slice())
            .unwrap_or(&[])
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut Vec<Row>> {
        let vendor = self.vendor;
        match self
            .tables
            .iter_mut()
            .find(|(entry, _)| vendor.table_name(&entry.schema, &entry.name) == table)
        {
            Some((_, rows)) => Ok(rows),
            None => bail!("relation '{}' does not exist", table),
        }
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    fn label(&self) -> String {
        format!("memory://{}", self.vendor.label())
    }

    async fn base_tables(&mut self) -> Result<Vec<CatalogEntry>> {
        Ok(self.tables.iter().map(|(entry, _)| entry.clone()).collect())
    }

    async fn select_all(&mut self, table: &str) -> Result<Vec<Row>> {
        if self.failing_selects.iter().any(|t| t == table) {
            bail!("injected select failure on '{}'", table);
        }
        Ok(self.table_mut(table)?.clone())
    }

    async fn count_rows(&mut self, table: &str) -> Result<i64> {
        if self.failing_counts.iter().any(|t| t == table) {
            bail!("injected count failure on '{}'", table);
        }
        Ok(self.table_mut(table)?.len() as i64)
    }

    async fn begin(&mut self) -> Result<()> {
        if self.in_transaction {
            bail!("transaction already open");
        }
        self.begins += 1;
        self.in_transaction = true;
        Ok(())
    }

    async fn execute_batch(
        &mut self,
        statement: &InsertStatement,
        rows: &[Vec<ColumnValue>],
    ) -> Result<()> {
        self.table_mut(&statement.table)?;

        for values in rows {
            if let Some(poison) = &self.fail_on_value {
                if values.contains(poison) {
                    bail!("injected insert failure on {:?}", poison);
                }
            }
            let row: Row = statement
                .columns
                .iter()
                .cloned()
                .zip(values.iter().cloned())
                .collect();

            if self.in_transaction {
                self.staged.push((statement.table.clone(), row));
            } else {
                self.table_mut(&statement.table)?.push(row);
            }
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            bail!("no transaction open");
        }
        self.commits += 1;
        self.in_transaction = false;
        for (table, row) in std::mem::take(&mut self.staged) {
            self.table_mut(&table)?.push(row);
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.rollbacks += 1;
        self.in_transaction = false;
        self.staged.clear();
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Build a row from `(column, value)` pairs
pub fn row<const N: usize>(columns: [(&str, ColumnValue); N]) -> Row {
    columns.into_iter().collect()
}
