// ABOUTME: SQLite driver behind the Database trait
// ABOUTME: Opens existing database files with rusqlite and maps storage classes to neutral values

pub mod converter;

use crate::config::ConnectionParams;
use crate::database::{CatalogEntry, Database, InsertStatement, Vendor};
use crate::value::{ColumnValue, Row};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::path::Path;

/// A SQLite database file
///
/// rusqlite is synchronous; every call completes before the trait method's
/// future resolves, which matches the engine's one-statement-at-a-time model.
pub struct SqliteDatabase {
    conn: Connection,
    label: String,
}

/// Open an existing SQLite database file
///
/// The file is not created when missing: a typo in the path should fail
/// the connection rather than migrate into an empty database.
pub fn open(params: &ConnectionParams) -> Result<SqliteDatabase> {
    let path = Path::new(&params.database);
    if !path.exists() {
        bail!("SQLite database file {} does not exist", path.display());
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open SQLite database {}", path.display()))?;

    Ok(SqliteDatabase::from_connection(conn, params.endpoint()))
}

impl SqliteDatabase {
    /// Wrap an already open connection, e.g. an in-memory database
    pub fn from_connection(conn: Connection, label: impl Into<String>) -> Self {
        SqliteDatabase {
            conn,
            label: label.into(),
        }
    }

    fn table_entries(&self) -> Result<Vec<CatalogEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .context("Failed to query sqlite_master")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(names
            .into_iter()
            .map(|name| CatalogEntry::new("main", name))
            .collect())
    }

    fn query_rows(&self, table: &str) -> Result<Vec<Row>> {
        let sql = format!("SELECT * FROM {}", Vendor::Sqlite.quote_table(table));
        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("Failed to prepare select on '{}'", table))?;

        let columns: Vec<(String, Option<String>)> = stmt
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.decl_type().map(str::to_string)))
            .collect();

        let mut rows = stmt.query([])?;
        let mut converted = Vec::new();
        while let Some(row) = rows.next()? {
            let mut neutral = Row::with_capacity(columns.len());
            for (index, (name, decl_type)) in columns.iter().enumerate() {
                let value = row.get_ref(index)?;
                neutral.push(
                    name.clone(),
                    converter::to_neutral(value, decl_type.as_deref()),
                );
            }
            converted.push(neutral);
        }
        Ok(converted)
    }

    fn insert_rows(&self, statement: &InsertStatement, rows: &[Vec<ColumnValue>]) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached(&statement.sql)
            .with_context(|| format!("Failed to prepare statement: {}", statement.sql))?;

        for (row_index, row) in rows.iter().enumerate() {
            stmt.execute(params_from_iter(row.iter().map(converter::from_neutral)))
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
}

#[async_trait]
impl Database for SqliteDatabase {
    fn vendor(&self) -> Vendor {
        Vendor::Sqlite
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    async fn base_tables(&mut self) -> Result<Vec<CatalogEntry>> {
        self.table_entries()
    }

    async fn select_all(&mut self, table: &str) -> Result<Vec<Row>> {
        self.query_rows(table)
            .with_context(|| format!("Failed to select rows from '{}'", table))
    }

    async fn count_rows(&mut self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", Vendor::Sqlite.quote_table(table));
        self.conn
            .query_row(&sql, [], |row| row.get(0))
            .with_context(|| format!("Failed to count rows in '{}'", table))
    }

    async fn begin(&mut self) -> Result<()> {
        self.conn
            .execute_batch("BEGIN")
            .context("Failed to start transaction")
    }

    async fn execute_batch(
        &mut self,
        statement: &InsertStatement,
        rows: &[Vec<ColumnValue>],
    ) -> Result<()> {
        self.insert_rows(statement, rows)
    }

    async fn commit(&mut self) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .context("Failed to commit transaction")
    }

    async fn rollback(&mut self) -> Result<()> {
        self.conn
            .execute_batch("ROLLBACK")
            .context("Failed to roll back transaction")
    }

    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| e)
            .context("Failed to close SQLite database")
    }
}
