// ABOUTME: Import operation loading an export directory into the target database
// ABOUTME: Refuses to connect when the directory has no manifest

use super::{close_connection, OperationResult};
use crate::config::ConnectionParams;
use crate::database;
use crate::error::MigrationError;
use crate::migration::MigrationManifest;
use crate::orchestrator::{ImportSummary, MigrationOptions, MigrationOrchestrator};
use std::path::Path;

/// Import the export directory `input_dir` into `params`
///
/// Tables are imported in manifest order, narrowed by the options' table
/// filter. A directory without a manifest fails before any connection is
/// opened.
pub async fn import_to_target(
    params: &ConnectionParams,
    input_dir: &Path,
    options: &MigrationOptions,
) -> OperationResult {
    match run(params, input_dir, options).await {
        Ok(summary) => OperationResult::success(format!(
            "Imported {} rows into {} tables",
            summary.total_rows(),
            summary.tables.len()
        ))
        .with_output_dir(input_dir),
        Err(e) => OperationResult::from_error("Import", &e).with_output_dir(input_dir),
    }
}

async fn run(
    params: &ConnectionParams,
    input_dir: &Path,
    options: &MigrationOptions,
) -> Result<ImportSummary, MigrationError> {
    params.validate()?;
    MigrationManifest::read(input_dir)?;

    let mut target = database::connect(params).await?;
    let mut orchestrator = MigrationOrchestrator::new(options.clone());
    let result = orchestrator.import(target.as_mut(), input_dir).await;
    close_connection(target).await;
    result
}
