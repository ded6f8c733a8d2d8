// ABOUTME: Imports one table's record file into the target in batched transactions
// ABOUTME: Each batch commits on success and rolls back on failure before the error surfaces

use super::record::RecordCodec;
use crate::database::{Database, InsertStatement};
use crate::error::MigrationError;
use crate::value::Row;
use anyhow::Result;
use std::path::Path;

/// Rows per transaction when the caller does not choose
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Import `<input_dir>/<table>.json` into `table`
///
/// The column list is taken from the first row; later rows missing a column
/// bind NULL and extra keys are ignored. Rows are written in transactions of
/// `batch_size`, each committed before the next begins. When a batch fails it
/// is rolled back and the error is returned; earlier batches stay committed.
/// The connection is never left inside a transaction.
///
/// A missing record file is logged and counts as zero rows. An empty file
/// returns zero without touching the connection.
///
/// # Errors
///
/// - [`MigrationError::Config`] if `batch_size` is zero
/// - [`MigrationError::Import`] naming the table and the failing phase
pub async fn import_table(
    db: &mut dyn Database,
    table: &str,
    input_dir: &Path,
    batch_size: usize,
    codec: &RecordCodec,
) -> Result<usize, MigrationError> {
    if batch_size == 0 {
        return Err(MigrationError::Config(
            "Batch size must be at least 1".to_string(),
        ));
    }

    let path = codec
        .record_path(input_dir, table)
        .map_err(|e| MigrationError::import(table, "resolve record file", e))?;
    if !path.exists() {
        tracing::warn!(
            "Record file {} not found; skipping table '{}'",
            path.display(),
            table
        );
        return Ok(0);
    }

    let rows = codec
        .read_rows(&path)
        .map_err(|e| MigrationError::import(table, "read record file", e))?;
    let Some(first) = rows.first() else {
        tracing::info!("Table '{}' has no rows to import", table);
        return Ok(0);
    };

    let columns: Vec<String> = first.column_names().map(str::to_string).collect();
    let statement = InsertStatement::new(db.vendor(), table, columns);

    tracing::info!("Importing {} rows into '{}'...", rows.len(), table);
    let total_batches = rows.len().div_ceil(batch_size);
    for (index, chunk) in rows.chunks(batch_size).enumerate() {
        let batch_number = index + 1;
        if let Err(e) = write_batch(db, &statement, chunk).await {
            if db.in_transaction() {
                if let Err(rollback_err) = db.rollback().await {
                    tracing::error!(
                        "Failed to roll back batch {} of '{}': {:#}",
                        batch_number,
                        table,
                        rollback_err
                    );
                }
            }
            return Err(MigrationError::import(
                table,
                format!("batch {}", batch_number),
                e,
            ));
        }
        tracing::debug!(
            "Committed batch {}/{} ({} rows) into '{}'",
            batch_number,
            total_batches,
            chunk.len(),
            table
        );
    }

    tracing::info!("✓ Imported {} rows into '{}'", rows.len(), table);
    Ok(rows.len())
}

async fn write_batch(db: &mut dyn Database, statement: &InsertStatement, rows: &[Row]) -> Result<()> {
    db.begin().await?;
    let values: Vec<_> = rows.iter().map(|row| statement.bind(row)).collect();
    db.execute_batch(statement, &values).await?;
    db.commit().await
}
