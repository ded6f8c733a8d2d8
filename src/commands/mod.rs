// ABOUTME: Operations the surrounding application invokes to migrate between databases
// ABOUTME: Each opens its connections, drives the orchestrator, and reports an OperationResult

pub mod export;
pub mod import;
pub mod migrate;
pub mod quick;
pub mod validate;

pub use export::export_from_source;
pub use import::import_to_target;
pub use migrate::migrate_full;
pub use quick::{quick_export, quick_import, quick_migrate};
pub use validate::validate_only;

use crate::config::ConnectionParams;
use crate::database::{self, Database};
use crate::error::MigrationError;
use crate::migration::ValidationReport;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Outcome of one operation
///
/// Operations never return `Err` and never panic; every failure ends up in
/// `message` with `success == false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    /// Export directory written or read by the operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ValidationReport>,
}

impl OperationResult {
    pub fn success(message: impl Into<String>) -> Self {
        OperationResult {
            success: true,
            message: message.into(),
            output_dir: None,
            report: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        OperationResult {
            success: false,
            message: message.into(),
            output_dir: None,
            report: None,
        }
    }

    /// Failure carrying the full error chain of `err`
    pub fn from_error(operation: &str, err: &MigrationError) -> Self {
        tracing::error!("{} failed: {}", operation, err);
        Self::failure(format!("{} failed: {}", operation, err))
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_report(mut self, report: ValidationReport) -> Self {
        self.report = Some(report);
        self
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.success { "✓" } else { "✗" };
        writeln!(f, "{} {}", mark, self.message)?;
        if let Some(dir) = &self.output_dir {
            writeln!(f, "  Directory: {}", dir.display())?;
        }
        if let Some(report) = &self.report {
            write!(f, "{}", report)?;
        }
        Ok(())
    }
}

/// Close a connection, logging instead of failing
pub(crate) async fn close_connection(db: Box<dyn Database>) {
    let label = db.label();
    match db.close().await {
        Ok(()) => tracing::debug!("Closed connection to {}", label),
        Err(e) => tracing::warn!("⚠ Failed to close connection to {}: {:#}", label, e),
    }
}

/// Open the source and target connections, closing the source again if the
/// target cannot be reached
pub(crate) async fn connect_pair(
    source: &ConnectionParams,
    target: &ConnectionParams,
) -> Result<(Box<dyn Database>, Box<dyn Database>), MigrationError> {
    source.validate()?;
    target.validate()?;

    let source_db = database::connect(source).await?;
    match database::connect(target).await {
        Ok(target_db) => Ok((source_db, target_db)),
        Err(e) => {
            close_connection(source_db).await;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_includes_cause() {
        let err = MigrationError::Config("batch size must be at least 1".to_string());
        let result = OperationResult::from_error("Import", &err);
        assert!(!result.success);
        assert!(result.message.contains("batch size must be at least 1"));
    }

    #[test]
    fn test_display_includes_directory() {
        let result = OperationResult::success("Exported 3 tables").with_output_dir("/tmp/export");
        let text = result.to_string();
        assert!(text.starts_with("✓ Exported 3 tables"));
        assert!(text.contains("/tmp/export"));
    }
}
