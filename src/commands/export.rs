// ABOUTME: Export operation writing every source table into an export directory
// ABOUTME: Creates a timestamped directory under the temp dir when none is given

use super::{close_connection, OperationResult};
use crate::config::ConnectionParams;
use crate::database;
use crate::error::MigrationError;
use crate::orchestrator::{ExportSummary, MigrationOptions, MigrationOrchestrator};
use crate::utils;
use std::path::PathBuf;

/// Directory prefix for exports without an explicit output directory
pub const EXPORT_DIR_PREFIX: &str = "mysql_export";

/// Export all user tables of `params` into `output_dir`
///
/// On success the result carries the export directory, which then holds one
/// record file per table and `metadata.json`.
pub async fn export_from_source(
    params: &ConnectionParams,
    output_dir: Option<PathBuf>,
    options: &MigrationOptions,
) -> OperationResult {
    match run(params, output_dir, options).await {
        Ok(summary) => OperationResult::success(format!(
            "Exported {} rows from {} tables",
            summary.total_rows(),
            summary.tables.len()
        ))
        .with_output_dir(summary.output_dir),
        Err(e) => OperationResult::from_error("Export", &e),
    }
}

async fn run(
    params: &ConnectionParams,
    output_dir: Option<PathBuf>,
    options: &MigrationOptions,
) -> Result<ExportSummary, MigrationError> {
    params.validate()?;
    let output_dir = match output_dir {
        Some(dir) => dir,
        None => utils::generate_output_dir(EXPORT_DIR_PREFIX)
            .map_err(|e| MigrationError::io(std::env::temp_dir(), e))?,
    };

    let mut source = database::connect(params).await?;
    let mut orchestrator = MigrationOrchestrator::new(options.clone());
    let result = orchestrator.export(source.as_mut(), &output_dir).await;
    close_connection(source).await;
    result
}
