// ABOUTME: Exports one table's rows into its record file
// ABOUTME: Reads with an unfiltered SELECT, converts to neutral values, writes JSON

use super::record::RecordCodec;
use crate::database::Database;
use crate::error::MigrationError;
use std::path::Path;

/// Export every row of `table` to `<output_dir>/<table>.json`
///
/// All rows are buffered in memory before the file is written. A failure
/// leaves whatever partial file exists in place; the directory is only
/// trustworthy once the manifest has been written.
///
/// # Returns
///
/// The number of rows written.
///
/// # Errors
///
/// Returns [`MigrationError::Export`] naming the table and the phase that
/// failed ("resolve record file", "read rows" or "write record file").
pub async fn export_table(
    db: &mut dyn Database,
    table: &str,
    output_dir: &Path,
    codec: &RecordCodec,
) -> Result<usize, MigrationError> {
    let path = codec
        .record_path(output_dir, table)
        .map_err(|e| MigrationError::export(table, "resolve record file", e))?;

    tracing::info!("Exporting table '{}'...", table);
    let rows = db
        .select_all(table)
        .await
        .map_err(|e| MigrationError::export(table, "read rows", e))?;

    codec
        .write_rows(&path, &rows)
        .map_err(|e| MigrationError::export(table, "write record file", e))?;

    tracing::info!("✓ Exported {} rows from '{}'", rows.len(), table);
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Vendor;
    use crate::testing::{row, MemoryDatabase};
    use crate::value::ColumnValue;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn people() -> MemoryDatabase {
        let created = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        MemoryDatabase::new(Vendor::MySql).with_table(
            "people",
            vec![row([
                ("id", ColumnValue::Integer(1)),
                ("name", "Ann".into()),
                ("score", ColumnValue::Null),
                ("created", ColumnValue::Timestamp(created)),
            ])],
        )
    }

    #[tokio::test]
    async fn test_export_writes_canonical_record_file() {
        let dir = TempDir::new().unwrap();
        let mut db = people();

        let count = export_table(&mut db, "people", dir.path(), &RecordCodec::new(false))
            .await
            .unwrap();

        assert_eq!(count, 1);
        let written = std::fs::read_to_string(dir.path().join("people.json")).unwrap();
        assert_eq!(
            written.trim_end(),
            r#"[{"id":1,"name":"Ann","score":null,"created":"2024-01-02 03:04:05"}]"#
        );
    }

    #[tokio::test]
    async fn test_export_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let codec = RecordCodec::default();
        let mut db = people();

        export_table(&mut db, "people", dir.path(), &codec)
            .await
            .unwrap();
        let first = std::fs::read(dir.path().join("people.json")).unwrap();
        export_table(&mut db, "people", dir.path(), &codec)
            .await
            .unwrap();
        let second = std::fs::read(dir.path().join("people.json")).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_table_writes_empty_array() {
        let dir = TempDir::new().unwrap();
        let mut db = MemoryDatabase::new(Vendor::MySql).with_table("empty", vec![]);

        let count = export_table(&mut db, "empty", dir.path(), &RecordCodec::new(false))
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("empty.json"))
                .unwrap()
                .trim_end(),
            "[]"
        );
    }

    #[tokio::test]
    async fn test_read_failure_names_table_and_phase() {
        let dir = TempDir::new().unwrap();
        let mut db = people();
        db.failing_selects.push("people".to_string());

        let err = export_table(&mut db, "people", dir.path(), &RecordCodec::default())
            .await
            .unwrap_err();

        match err {
            MigrationError::Export { table, phase, .. } => {
                assert_eq!(table, "people");
                assert_eq!(phase, "read rows");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_unsafe_table_name_is_rejected_before_reading() {
        let dir = TempDir::new().unwrap();
        let mut db = people();

        let err = export_table(&mut db, "../people", dir.path(), &RecordCodec::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("resolve record file"));
    }
}
