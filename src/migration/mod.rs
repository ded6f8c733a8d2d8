// ABOUTME: Migration building blocks used by the orchestrator
// ABOUTME: Table catalog, record files, export, import, manifest, and validation

pub mod catalog;
pub mod export;
pub mod import;
pub mod manifest;
pub mod record;
pub mod validate;

pub use catalog::list_tables;
pub use export::export_table;
pub use import::{import_table, DEFAULT_BATCH_SIZE};
pub use manifest::{MigrationManifest, MANIFEST_FILE};
pub use record::RecordCodec;
pub use validate::{validate_tables, TableValidation, ValidationReport};
