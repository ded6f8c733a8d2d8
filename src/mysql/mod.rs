// ABOUTME: MySQL driver behind the Database trait
// ABOUTME: Connects with mysql_async, reads tables over the binary protocol, writes in batches

pub mod converter;

use crate::config::ConnectionParams;
use crate::database::{CatalogEntry, Database, InsertStatement, Vendor};
use crate::value::{ColumnValue, Row};
use anyhow::{Context, Result};
use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, SslOpts};

/// A single MySQL connection
pub struct MySqlDatabase {
    conn: Conn,
    label: String,
    in_transaction: bool,
}

/// Open a MySQL connection
///
/// The session is switched to `utf8mb4` so every Unicode code point survives
/// the round trip. TLS is requested when `params.tls` is set.
pub async fn connect(params: &ConnectionParams) -> Result<MySqlDatabase> {
    let mut builder = OptsBuilder::default()
        .ip_or_hostname(params.host.as_str())
        .tcp_port(params.port)
        .db_name(Some(params.database.as_str()))
        .user(Some(params.username.as_str()))
        .pass(Some(params.password.as_str()))
        .init(vec!["SET NAMES utf8mb4"]);

    if params.tls {
        builder = builder.ssl_opts(SslOpts::default());
    } else {
        tracing::debug!("MySQL TLS is disabled for {}", params.endpoint());
    }

    let mut conn = Conn::new(builder)
        .await
        .context("Failed to connect to MySQL server")?;
    conn.query_drop("SELECT 1")
        .await
        .context("MySQL server did not answer a test query")?;

    Ok(MySqlDatabase {
        conn,
        label: params.endpoint(),
        in_transaction: false,
    })
}

#[async_trait]
impl Database for MySqlDatabase {
    fn vendor(&self) -> Vendor {
        Vendor::MySql
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    async fn base_tables(&mut self) -> Result<Vec<CatalogEntry>> {
        let tables: Vec<(String, String)> = self
            .conn
            .query(
                "SELECT TABLE_SCHEMA, TABLE_NAME FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
                 ORDER BY TABLE_NAME",
            )
            .await
            .context("Failed to query information_schema.TABLES")?;

        Ok(tables
            .into_iter()
            .map(|(schema, name)| CatalogEntry::new(schema, name))
            .collect())
    }

    async fn select_all(&mut self, table: &str) -> Result<Vec<Row>> {
        let sql = format!("SELECT * FROM {}", Vendor::MySql.quote_table(table));
        let rows: Vec<mysql_async::Row> = self
            .conn
            .exec(sql.as_str(), ())
            .await
            .with_context(|| format!("Failed to select rows from '{}'", table))?;

        let mut converted = Vec::with_capacity(rows.len());
        for row in rows {
            let columns = row.columns();
            let values = row.unwrap();
            let mut neutral = Row::with_capacity(columns.len());
            for (column, value) in columns.iter().zip(values) {
                let name = column.name_str();
                let value = converter::to_neutral(value, column)
                    .with_context(|| format!("Failed to convert column '{}'", name))?;
                neutral.push(name.into_owned(), value);
            }
            converted.push(neutral);
        }
        Ok(converted)
    }

    async fn count_rows(&mut self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", Vendor::MySql.quote_table(table));
        let count: Option<i64> = self
            .conn
            .query_first(sql)
            .await
            .with_context(|| format!("Failed to count rows in '{}'", table))?;
        Ok(count.unwrap_or(0))
    }

    async fn begin(&mut self) -> Result<()> {
        self.conn
            .query_drop("START TRANSACTION")
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
        let params: Vec<Vec<mysql_async::Value>> = rows
            .iter()
            .map(|row| row.iter().map(converter::from_neutral).collect())
            .collect();

        self.conn
            .exec_batch(statement.sql.as_str(), params)
            .await
            .with_context(|| format!("Failed to insert into '{}'", statement.table))
    }

    async fn commit(&mut self) -> Result<()> {
        self.conn
            .query_drop("COMMIT")
            .await
            .context("Failed to commit transaction")?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.in_transaction = false;
        self.conn
            .query_drop("ROLLBACK")
            .await
            .context("Failed to roll back transaction")
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .disconnect()
            .await
            .context("Failed to close MySQL connection")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> ConnectionParams {
        let url = std::env::var("TEST_MYSQL_URL")
            .expect("TEST_MYSQL_URL must be set for MySQL integration tests");
        ConnectionParams::from_url(&url).expect("TEST_MYSQL_URL must be a mysql:// URL")
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_host_fails() {
        let mut params = ConnectionParams::mysql_default();
        params.host = "127.0.0.1".to_string();
        params.port = 1;
        assert!(connect(&params).await.is_err());
    }

    // Requires a MySQL server; run with TEST_MYSQL_URL=mysql://... cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_batch_insert_and_read_back() {
        let mut db = connect(&test_params()).await.unwrap();
        db.conn
            .query_drop(
                "CREATE TEMPORARY TABLE migrator_probe \
                 (id INT PRIMARY KEY, name VARCHAR(50), active TINYINT(1), created DATETIME)",
            )
            .await
            .unwrap();

        let statement = InsertStatement::new(
            Vendor::MySql,
            "migrator_probe",
            vec![
                "id".to_string(),
                "name".to_string(),
                "active".to_string(),
                "created".to_string(),
            ],
        );
        let created = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let rows = vec![
            vec![
                ColumnValue::Integer(1),
                ColumnValue::Text("Ann".into()),
                ColumnValue::Boolean(true),
                ColumnValue::Timestamp(created),
            ],
            vec![
                ColumnValue::Integer(2),
                ColumnValue::Null,
                ColumnValue::Boolean(false),
                ColumnValue::Null,
            ],
        ];

        db.begin().await.unwrap();
        db.execute_batch(&statement, &rows).await.unwrap();
        db.commit().await.unwrap();

        let read = db.select_all("migrator_probe").await.unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].get("active"), Some(&ColumnValue::Boolean(true)));
        assert_eq!(read[0].get("created"), Some(&ColumnValue::Timestamp(created)));
        assert_eq!(read[1].get("name"), Some(&ColumnValue::Null));
        assert_eq!(db.count_rows("migrator_probe").await.unwrap(), 2);

        Box::new(db).close().await.unwrap();
    }
}
