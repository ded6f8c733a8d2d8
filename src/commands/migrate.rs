// ABOUTME: Full migration operation chaining export, import, and validation
// ABOUTME: Uses a timestamped working directory under the temp dir when none is given

use super::{close_connection, connect_pair, OperationResult};
use crate::config::ConnectionParams;
use crate::error::MigrationError;
use crate::orchestrator::{MigrationOptions, MigrationOrchestrator, MigrationSummary};
use crate::utils;
use std::path::{Path, PathBuf};

/// Directory prefix for migrations without an explicit working directory
pub const MIGRATION_DIR_PREFIX: &str = "migration_temp";

/// Export `source`, import into `target`, then validate the imported tables
///
/// Success means every step completed. Row-count mismatches are reported in
/// the attached report and in the message; they do not fail the migration.
/// The working directory is kept so the export can be inspected or
/// re-imported.
pub async fn migrate_full(
    source: &ConnectionParams,
    target: &ConnectionParams,
    temp_dir: Option<PathBuf>,
    options: &MigrationOptions,
) -> OperationResult {
    let work_dir = match temp_dir {
        Some(dir) => dir,
        None => match utils::generate_output_dir(MIGRATION_DIR_PREFIX) {
            Ok(dir) => dir,
            Err(e) => {
                let err = MigrationError::io(std::env::temp_dir(), e);
                return OperationResult::from_error("Migration", &err);
            }
        },
    };

    match run(source, target, &work_dir, options).await {
        Ok(summary) => {
            let message = if summary.report.passed() {
                format!(
                    "Migrated {} rows across {} tables; all row counts match",
                    summary.import.total_rows(),
                    summary.import.tables.len()
                )
            } else {
                format!(
                    "Migrated {} rows across {} tables; {} tables have mismatched row counts",
                    summary.import.total_rows(),
                    summary.import.tables.len(),
                    summary.report.mismatches().count()
                )
            };
            OperationResult::success(message)
                .with_output_dir(work_dir)
                .with_report(summary.report)
        }
        Err(e) => OperationResult::from_error("Migration", &e).with_output_dir(work_dir),
    }
}

async fn run(
    source: &ConnectionParams,
    target: &ConnectionParams,
    work_dir: &Path,
    options: &MigrationOptions,
) -> Result<MigrationSummary, MigrationError> {
    let (mut source_db, mut target_db) = connect_pair(source, target).await?;

    let mut options = options.clone();
    options.target_label = target.endpoint();
    let mut orchestrator = MigrationOrchestrator::new(options);
    let result = orchestrator
        .run_full(source_db.as_mut(), target_db.as_mut(), work_dir)
        .await;

    close_connection(source_db).await;
    close_connection(target_db).await;
    result
}
