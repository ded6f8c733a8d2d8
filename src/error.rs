// ABOUTME: Typed error taxonomy for migration operations
// ABOUTME: Wraps driver failures with the table and phase they happened in

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the migration engine.
///
/// Driver-level failures arrive as `anyhow::Error` and are wrapped here with
/// the endpoint, table and phase they belong to, so an operator can diagnose
/// a failed run from the message alone.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// A database connection could not be opened or used
    #[error("Cannot use database connection {endpoint}: {cause:#}")]
    Connectivity {
        endpoint: String,
        cause: anyhow::Error,
    },

    /// Reading a table or writing its record file failed
    #[error("Export of table '{table}' failed during {phase}: {cause:#}")]
    Export {
        table: String,
        phase: String,
        cause: anyhow::Error,
    },

    /// The directory handed to import has no manifest
    #[error("Migration manifest not found: {}", path.display())]
    ManifestMissing { path: PathBuf },

    /// The manifest exists but cannot be parsed
    #[error("Migration manifest {} is invalid: {cause:#}", path.display())]
    ManifestInvalid { path: PathBuf, cause: anyhow::Error },

    /// Writing rows into the target failed; the in-flight batch was rolled back
    #[error("Import of table '{table}' failed during {phase}: {cause:#}")]
    Import {
        table: String,
        phase: String,
        cause: anyhow::Error,
    },

    /// Invalid parameters, missing environment variables, misuse of the orchestrator
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem failure outside a single table's record file
    #[error("I/O failure at {}: {cause:#}", path.display())]
    Io { path: PathBuf, cause: anyhow::Error },
}

impl MigrationError {
    pub fn connectivity(endpoint: impl Into<String>, cause: impl Into<anyhow::Error>) -> Self {
        MigrationError::Connectivity {
            endpoint: endpoint.into(),
            cause: cause.into(),
        }
    }

    pub fn export(
        table: impl Into<String>,
        phase: impl Into<String>,
        cause: impl Into<anyhow::Error>,
    ) -> Self {
        MigrationError::Export {
            table: table.into(),
            phase: phase.into(),
            cause: cause.into(),
        }
    }

    pub fn import(
        table: impl Into<String>,
        phase: impl Into<String>,
        cause: impl Into<anyhow::Error>,
    ) -> Self {
        MigrationError::Import {
            table: table.into(),
            phase: phase.into(),
            cause: cause.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, cause: impl Into<anyhow::Error>) -> Self {
        MigrationError::Io {
            path: path.into(),
            cause: cause.into(),
        }
    }

    /// Table the failure belongs to, when it belongs to one
    pub fn table(&self) -> Option<&str> {
        match self {
            MigrationError::Export { table, .. } | MigrationError::Import { table, .. } => {
                Some(table)
            }
            _ => None,
        }
    }
}
