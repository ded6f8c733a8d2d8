// ABOUTME: One-button operations from the local development MySQL to the managed PostgreSQL target
// ABOUTME: The target comes from AZURE_POSTGRES_* environment variables

use super::{export_from_source, import_to_target, migrate_full, OperationResult};
use crate::config::{azure_target_from_env, ConnectionParams};
use crate::orchestrator::MigrationOptions;
use std::path::{Path, PathBuf};

/// Export the default local MySQL database
pub async fn quick_export(output_dir: Option<PathBuf>, options: &MigrationOptions) -> OperationResult {
    export_from_source(&ConnectionParams::mysql_default(), output_dir, options).await
}

/// Import `input_dir` into the environment-configured target
///
/// Missing environment variables fail before any connection attempt.
pub async fn quick_import(input_dir: &Path, options: &MigrationOptions) -> OperationResult {
    let target = match azure_target_from_env() {
        Ok(target) => target,
        Err(e) => return OperationResult::from_error("Quick import", &e),
    };
    import_to_target(&target, input_dir, options).await
}

/// Migrate the default local MySQL database to the environment-configured target
pub async fn quick_migrate(temp_dir: Option<PathBuf>, options: &MigrationOptions) -> OperationResult {
    let target = match azure_target_from_env() {
        Ok(target) => target,
        Err(e) => return OperationResult::from_error("Quick migration", &e),
    };
    migrate_full(&ConnectionParams::mysql_default(), &target, temp_dir, options).await
}

