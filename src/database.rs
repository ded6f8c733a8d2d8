// ABOUTME: Narrow database interface shared by every vendor driver
// ABOUTME: Vendor metadata, INSERT statement construction, and connection dispatch

use crate::config::ConnectionParams;
use crate::error::MigrationError;
use crate::value::{ColumnValue, Row};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Database vendors the engine can read from and write to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    #[value(name = "mysql")]
    MySql,
    #[value(name = "postgres", alias = "postgresql")]
    #[serde(alias = "postgresql")]
    Postgres,
    #[value(name = "sqlite")]
    Sqlite,
}

impl Vendor {
    /// Human-readable label recorded in the manifest
    pub fn label(&self) -> &'static str {
        match self {
            Vendor::MySql => "MySQL",
            Vendor::Postgres => "PostgreSQL",
            Vendor::Sqlite => "SQLite",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Vendor::MySql => 3306,
            Vendor::Postgres => 5432,
            Vendor::Sqlite => 0,
        }
    }

    /// Schemas holding the vendor's own catalog and bookkeeping tables
    pub fn system_schemas(&self) -> &'static [&'static str] {
        match self {
            Vendor::MySql => &["information_schema", "performance_schema", "mysql", "sys"],
            Vendor::Postgres => &["pg_catalog", "information_schema", "pg_toast"],
            Vendor::Sqlite => &[],
        }
    }

    /// Table-name prefixes reserved for internal tables
    pub fn internal_table_prefixes(&self) -> &'static [&'static str] {
        match self {
            Vendor::MySql => &[],
            Vendor::Postgres => &["pg_"],
            Vendor::Sqlite => &["sqlite_"],
        }
    }

    /// Name a discovered table the way it is recorded in the manifest.
    ///
    /// PostgreSQL tables outside `public` keep their schema as a `schema.table`
    /// prefix, as do `public` tables whose own name contains a dot, so
    /// [`Vendor::quote_table`] always splits at the schema boundary. Every
    /// other vendor scopes the catalog to one schema.
    pub fn table_name(&self, schema: &str, name: &str) -> String {
        match self {
            Vendor::Postgres if schema != "public" || name.contains('.') => {
                format!("{}.{}", schema, name)
            }
            _ => name.to_string(),
        }
    }

    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Vendor::MySql => format!("`{}`", ident.replace('`', "``")),
            Vendor::Postgres | Vendor::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Quote a manifest table name, splitting `schema.table` for PostgreSQL
    ///
    /// The split is at the first dot; the table part may contain further dots.
    pub fn quote_table(&self, table: &str) -> String {
        match (self, table.split_once('.')) {
            (Vendor::Postgres, Some((schema, name))) => {
                format!("{}.{}", self.quote_ident(schema), self.quote_ident(name))
            }
            _ => self.quote_ident(table),
        }
    }

    /// Positional parameter marker, 1-based
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Vendor::Postgres => format!("${}", index),
            Vendor::MySql | Vendor::Sqlite => "?".to_string(),
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A base table as reported by a driver, before system tables are filtered out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub schema: String,
    pub name: String,
}

impl CatalogEntry {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        CatalogEntry {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

/// Parameterized INSERT for one table, built once per import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Vec<String>,
    pub sql: String,
}

impl InsertStatement {
    pub fn new(vendor: Vendor, table: &str, columns: Vec<String>) -> Self {
        let column_list = columns
            .iter()
            .map(|c| vendor.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| vendor.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            vendor.quote_table(table),
            column_list,
            placeholders
        );

        InsertStatement {
            table: table.to_string(),
            columns,
            sql,
        }
    }

    /// Values of `row` in statement column order; absent columns bind NULL
    pub fn bind(&self, row: &Row) -> Vec<ColumnValue> {
        self.columns
            .iter()
            .map(|column| row.get(column).cloned().unwrap_or(ColumnValue::Null))
            .collect()
    }
}

/// An open connection to one database, seen as a plain SQL endpoint.
///
/// Connections start in auto-commit mode. `begin` switches to an explicit
/// transaction that lasts until `commit` or `rollback`. Dropping the value
/// closes the connection.
#[async_trait]
pub trait Database: Send {
    fn vendor(&self) -> Vendor;

    /// Endpoint description for logs and errors (never includes the password)
    fn label(&self) -> String;

    /// Base tables (views excluded) in discovery order, system tables included
    async fn base_tables(&mut self) -> Result<Vec<CatalogEntry>>;

    /// Every row of `table` (`SELECT *`), converted to neutral values
    async fn select_all(&mut self, table: &str) -> Result<Vec<Row>>;

    async fn count_rows(&mut self, table: &str) -> Result<i64>;

    async fn begin(&mut self) -> Result<()>;

    /// Execute `statement` once per entry of `rows` inside the open transaction
    async fn execute_batch(
        &mut self,
        statement: &InsertStatement,
        rows: &[Vec<ColumnValue>],
    ) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// True between `begin` and the matching `commit`/`rollback`
    fn in_transaction(&self) -> bool;

    /// Close the connection, reporting any error the server returns on the way out
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Open a connection for `params`, mapping any failure to a connectivity error
pub async fn connect(params: &ConnectionParams) -> Result<Box<dyn Database>, MigrationError> {
    params.validate()?;
    let endpoint = params.endpoint();

    tracing::info!("Connecting to {}...", endpoint);
    let database: Result<Box<dyn Database>> = match params.vendor {
        Vendor::MySql => crate::mysql::connect(params)
            .await
            .map(|db| Box::new(db) as Box<dyn Database>),
        Vendor::Postgres => crate::postgres::connect(params)
            .await
            .map(|db| Box::new(db) as Box<dyn Database>),
        Vendor::Sqlite => {
            crate::sqlite::open(params).map(|db| Box::new(db) as Box<dyn Database>)
        }
    };

    let database = database.map_err(|e| MigrationError::connectivity(&endpoint, e))?;
    tracing::info!("✓ Connected to {}", endpoint);
    Ok(database)
}
