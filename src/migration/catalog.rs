// ABOUTME: Schema introspection for export planning
// ABOUTME: Lists user tables in discovery order, excluding vendor system tables

use crate::database::{CatalogEntry, Database, Vendor};
use crate::error::MigrationError;

/// List all user tables in the connected database
///
/// Base tables are taken from the driver in discovery order; tables owned by
/// a system schema, or named with a vendor-internal prefix, are dropped and
/// duplicates are removed. The returned names are what the manifest records
/// and what import later addresses.
///
/// # Errors
///
/// Returns [`MigrationError::Connectivity`] if the catalog cannot be read.
pub async fn list_tables(db: &mut dyn Database) -> Result<Vec<String>, MigrationError> {
    let vendor = db.vendor();
    tracing::info!("Listing tables in {}", db.label());

    let entries = db
        .base_tables()
        .await
        .map_err(|e| MigrationError::connectivity(db.label(), e))?;

    let mut tables: Vec<String> = Vec::with_capacity(entries.len());
    for entry in entries {
        if is_system_table(vendor, &entry) {
            tracing::debug!("Skipping system table {}.{}", entry.schema, entry.name);
            continue;
        }
        let name = vendor.table_name(&entry.schema, &entry.name);
        if !tables.contains(&name) {
            tables.push(name);
        }
    }

    tracing::info!("Found {} user tables", tables.len());
    Ok(tables)
}

fn is_system_table(vendor: Vendor, entry: &CatalogEntry) -> bool {
    let schema = entry.schema.to_ascii_lowercase();
    vendor.system_schemas().contains(&schema.as_str())
        || vendor
            .internal_table_prefixes()
            .iter()
            .any(|prefix| entry.name.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryDatabase;

    #[tokio::test]
    async fn test_mysql_system_schemas_are_excluded() {
        let mut db = MemoryDatabase::new(Vendor::MySql)
            .with_table("users", vec![])
            .with_schema_table("mysql", "user", vec![])
            .with_schema_table("information_schema", "TABLES", vec![])
            .with_schema_table("performance_schema", "threads", vec![])
            .with_schema_table("sys", "sys_config", vec![])
            .with_table("orders", vec![]);

        let tables = list_tables(&mut db).await.unwrap();
        assert_eq!(tables, vec!["users", "orders"]);
    }

    #[tokio::test]
    async fn test_user_table_with_system_like_name_is_kept() {
        // Only the owning schema matters for MySQL, not the table name
        let mut db = MemoryDatabase::new(Vendor::MySql)
            .with_table("mysql_settings", vec![])
            .with_table("sys_log", vec![]);

        let tables = list_tables(&mut db).await.unwrap();
        assert_eq!(tables, vec!["mysql_settings", "sys_log"]);
    }

    #[tokio::test]
    async fn test_postgres_schema_qualification_and_prefixes() {
        let mut db = MemoryDatabase::new(Vendor::Postgres)
            .with_table("users", vec![])
            .with_schema_table("audit", "events", vec![])
            .with_schema_table("pg_catalog", "pg_class", vec![])
            .with_table("pg_stat_custom", vec![]);

        let tables = list_tables(&mut db).await.unwrap();
        assert_eq!(tables, vec!["users", "audit.events"]);
    }

    #[tokio::test]
    async fn test_sqlite_internal_tables_are_excluded() {
        let mut db = MemoryDatabase::new(Vendor::Sqlite)
            .with_table("sqlite_sequence", vec![])
            .with_table("notes", vec![]);

        let tables = list_tables(&mut db).await.unwrap();
        assert_eq!(tables, vec!["notes"]);
    }

    #[tokio::test]
    async fn test_duplicates_are_removed_in_order() {
        let mut db = MemoryDatabase::new(Vendor::MySql)
            .with_table("b", vec![])
            .with_table("a", vec![])
            .with_table("b", vec![]);

        let tables = list_tables(&mut db).await.unwrap();
        assert_eq!(tables, vec!["b", "a"]);
    }
}
