// ABOUTME: State machine sequencing catalog, export, manifest, import, and validation
// ABOUTME: The single entry point the operation layer drives for every migration run

use crate::database::Database;
use crate::error::MigrationError;
use crate::migration::{
    export_table, import_table, list_tables, validate_tables, MigrationManifest, RecordCodec,
    ValidationReport, DEFAULT_BATCH_SIZE,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a migration run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Idle,
    Exporting,
    Exported,
    Importing,
    Imported,
    Validating,
    Done,
    Failed,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationState::Idle => "idle",
            MigrationState::Exporting => "exporting",
            MigrationState::Exported => "exported",
            MigrationState::Importing => "importing",
            MigrationState::Imported => "imported",
            MigrationState::Validating => "validating",
            MigrationState::Done => "done",
            MigrationState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Narrows the set of tables an import touches
///
/// The manifest does not encode foreign-key order, so operators import
/// parents first by running import with `include`, then the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFilter {
    /// When set, only these tables are imported
    pub include: Option<Vec<String>>,
    /// Tables never imported
    pub exclude: Vec<String>,
}

impl TableFilter {
    pub fn is_empty(&self) -> bool {
        self.include.is_none() && self.exclude.is_empty()
    }

    pub fn allows(&self, table: &str) -> bool {
        let included = self
            .include
            .as_ref()
            .map_or(true, |include| include.iter().any(|t| t == table));
        included && !self.exclude.iter().any(|t| t == table)
    }

    /// Tables of `tables` this filter allows, keeping their order
    ///
    /// Names in the filter that do not appear in `tables` are logged.
    pub fn apply(&self, tables: &[String]) -> Vec<String> {
        let named = self
            .include
            .iter()
            .flatten()
            .chain(self.exclude.iter());
        for name in named {
            if !tables.contains(name) {
                tracing::warn!("⚠ Table filter names '{}', which is not in the manifest", name);
            }
        }

        tables
            .iter()
            .filter(|table| self.allows(table))
            .cloned()
            .collect()
    }
}

/// Knobs for one migration run
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Rows per import transaction
    pub batch_size: usize,
    /// Label recorded as the manifest's target database
    pub target_label: String,
    pub codec: RecordCodec,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
    pub table_filter: TableFilter,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        MigrationOptions {
            batch_size: DEFAULT_BATCH_SIZE,
            target_label: "PostgreSQL".to_string(),
            codec: RecordCodec::default(),
            show_progress: false,
            table_filter: TableFilter::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub output_dir: PathBuf,
    /// `(table, rows)` in manifest order
    pub tables: Vec<(String, usize)>,
}

impl ExportSummary {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|(_, rows)| rows).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    /// `(table, rows)` in import order
    pub tables: Vec<(String, usize)>,
}

impl ImportSummary {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|(_, rows)| rows).sum()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|(table, _)| table.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSummary {
    pub export: ExportSummary,
    pub import: ImportSummary,
    pub report: ValidationReport,
}

/// Sequences one migration run
///
/// ```text
/// Idle → Exporting → Exported → Importing → Imported → Validating → Done
/// ```
///
/// Any failure moves the run to `Failed`; nothing is retried. Export and
/// validation can also start from `Idle` on their own, and import can start
/// from `Idle` against an existing export directory.
pub struct MigrationOrchestrator {
    state: MigrationState,
    options: MigrationOptions,
}

impl MigrationOrchestrator {
    pub fn new(options: MigrationOptions) -> Self {
        MigrationOrchestrator {
            state: MigrationState::Idle,
            options,
        }
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    fn require(&self, allowed: &[MigrationState], step: &str) -> Result<(), MigrationError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(MigrationError::Config(format!(
                "Cannot {} while the migration is {}",
                step, self.state
            )))
        }
    }

    /// Record the outcome of a step, moving to `Failed` on error
    fn settle<T>(
        &mut self,
        result: Result<T, MigrationError>,
        next: MigrationState,
    ) -> Result<T, MigrationError> {
        match result {
            Ok(value) => {
                self.state = next;
                Ok(value)
            }
            Err(e) => {
                tracing::error!("Migration failed: {}", e);
                self.state = MigrationState::Failed;
                Err(e)
            }
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }
        let progress = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            progress.set_style(style.progress_chars("##-"));
        }
        progress
    }

    /// Export every user table of `source` into `output_dir`
    ///
    /// The manifest is written only after every table has been exported, so
    /// a directory without one is an incomplete export.
    pub async fn export(
        &mut self,
        source: &mut dyn Database,
        output_dir: &Path,
    ) -> Result<ExportSummary, MigrationError> {
        self.require(&[MigrationState::Idle], "export")?;
        self.state = MigrationState::Exporting;

        let result = self.run_export(source, output_dir).await;
        self.settle(result, MigrationState::Exported)
    }

    async fn run_export(
        &self,
        source: &mut dyn Database,
        output_dir: &Path,
    ) -> Result<ExportSummary, MigrationError> {
        std::fs::create_dir_all(output_dir).map_err(|e| MigrationError::io(output_dir, e))?;

        let tables = list_tables(source).await?;
        if tables.is_empty() {
            tracing::warn!("⚠ No user tables found in {}", source.label());
        }

        tracing::info!(
            "Exporting {} tables to {}",
            tables.len(),
            output_dir.display()
        );
        let progress = self.progress_bar(tables.len());
        let mut exported = Vec::with_capacity(tables.len());
        for table in &tables {
            progress.set_message(format!("Exporting {}", table));
            let rows = export_table(source, table, output_dir, &self.options.codec).await;
            let rows = match rows {
                Ok(rows) => rows,
                Err(e) => {
                    progress.abandon_with_message(format!("Failed on {}", table));
                    return Err(e);
                }
            };
            exported.push((table.clone(), rows));
            progress.inc(1);
        }
        progress.finish_with_message("Export complete");

        MigrationManifest::new(tables, source.label(), self.options.target_label.clone())
            .write(output_dir)?;

        let summary = ExportSummary {
            output_dir: output_dir.to_path_buf(),
            tables: exported,
        };
        tracing::info!(
            "✓ Exported {} rows from {} tables",
            summary.total_rows(),
            summary.tables.len()
        );
        Ok(summary)
    }

    /// Import the export directory `input_dir` into `target`
    ///
    /// The manifest is read before anything is written, so a directory
    /// without one fails with no rows written anywhere.
    pub async fn import(
        &mut self,
        target: &mut dyn Database,
        input_dir: &Path,
    ) -> Result<ImportSummary, MigrationError> {
        self.require(&[MigrationState::Idle, MigrationState::Exported], "import")?;
        self.state = MigrationState::Importing;

        let result = self.run_import(target, input_dir).await;
        self.settle(result, MigrationState::Imported)
    }

    async fn run_import(
        &self,
        target: &mut dyn Database,
        input_dir: &Path,
    ) -> Result<ImportSummary, MigrationError> {
        let manifest = MigrationManifest::read(input_dir)?;
        tracing::info!(
            "Importing export taken {} from {}",
            manifest.export_timestamp,
            manifest.source_database
        );

        let tables = if self.options.table_filter.is_empty() {
            manifest.tables.clone()
        } else {
            let selected = self.options.table_filter.apply(&manifest.tables);
            tracing::info!(
                "Table filter selected {} of {} tables",
                selected.len(),
                manifest.tables.len()
            );
            selected
        };

        let progress = self.progress_bar(tables.len());
        let mut imported = Vec::with_capacity(tables.len());
        for table in &tables {
            progress.set_message(format!("Importing {}", table));
            let rows = import_table(
                target,
                table,
                input_dir,
                self.options.batch_size,
                &self.options.codec,
            )
            .await;
            let rows = match rows {
                Ok(rows) => rows,
                Err(e) => {
                    progress.abandon_with_message(format!("Failed on {}", table));
                    return Err(e);
                }
            };
            imported.push((table.clone(), rows));
            progress.inc(1);
        }
        progress.finish_with_message("Import complete");

        let summary = ImportSummary { tables: imported };
        tracing::info!(
            "✓ Imported {} rows into {} tables",
            summary.total_rows(),
            summary.tables.len()
        );
        Ok(summary)
    }

    /// Compare row counts of `tables` on both sides
    ///
    /// Mismatches live in the report; the only error is calling this in the
    /// wrong state.
    pub async fn validate(
        &mut self,
        source: &mut dyn Database,
        target: &mut dyn Database,
        tables: &[String],
    ) -> Result<ValidationReport, MigrationError> {
        self.require(&[MigrationState::Idle, MigrationState::Imported], "validate")?;
        self.state = MigrationState::Validating;

        tracing::info!("Validating row counts for {} tables", tables.len());
        let report = validate_tables(source, target, tables).await;
        if report.passed() {
            tracing::info!("✓ All {} tables match", report.tables.len());
        } else {
            tracing::warn!(
                "⚠ {} of {} tables differ",
                report.mismatches().count(),
                report.tables.len()
            );
        }

        self.state = MigrationState::Done;
        Ok(report)
    }

    /// Export, import, then validate the imported tables
    pub async fn run_full(
        &mut self,
        source: &mut dyn Database,
        target: &mut dyn Database,
        work_dir: &Path,
    ) -> Result<MigrationSummary, MigrationError> {
        self.require(&[MigrationState::Idle], "run a full migration")?;

        let export = self.export(source, work_dir).await?;
        let import = self.import(target, work_dir).await?;
        let report = self
            .validate(source, target, &import.table_names())
            .await?;

        Ok(MigrationSummary {
            export,
            import,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Vendor;
    use crate::migration::MANIFEST_FILE;
    use crate::testing::{row, MemoryDatabase};
    use crate::value::{ColumnValue, Row};
    use tempfile::TempDir;

    fn rows(count: i64) -> Vec<Row> {
        (1..=count)
            .map(|id| row([("id", ColumnValue::Integer(id)), ("name", "x".into())]))
            .collect()
    }

    fn source() -> MemoryDatabase {
        MemoryDatabase::new(Vendor::MySql)
            .with_table("users", rows(3))
            .with_schema_table("mysql", "user", rows(1))
            .with_table("orders", rows(5))
    }

    fn empty_target() -> MemoryDatabase {
        MemoryDatabase::new(Vendor::Postgres)
            .with_table("users", vec![])
            .with_table("orders", vec![])
    }

    #[tokio::test]
    async fn test_full_run_reaches_done_with_matching_counts() {
        let dir = TempDir::new().unwrap();
        let mut source = source();
        let mut target = empty_target();
        let mut orchestrator = MigrationOrchestrator::new(MigrationOptions {
            batch_size: 2,
            ..Default::default()
        });

        let summary = orchestrator
            .run_full(&mut source, &mut target, dir.path())
            .await
            .unwrap();

        assert_eq!(orchestrator.state(), MigrationState::Done);
        assert_eq!(summary.export.total_rows(), 8);
        assert_eq!(summary.import.total_rows(), 8);
        assert!(summary.report.passed());
        assert_eq!(target.rows("orders").len(), 5);
    }

    #[tokio::test]
    async fn test_manifest_lists_exactly_the_catalog_tables() {
        let dir = TempDir::new().unwrap();
        let mut source = source();
        let mut orchestrator = MigrationOrchestrator::new(MigrationOptions::default());

        orchestrator.export(&mut source, dir.path()).await.unwrap();

        let manifest = MigrationManifest::read(dir.path()).unwrap();
        assert_eq!(manifest.tables, vec!["users", "orders"]);
        assert_eq!(manifest.table_count, 2);
        assert_eq!(orchestrator.state(), MigrationState::Exported);
    }

    #[tokio::test]
    async fn test_failed_export_writes_no_manifest() {
        let dir = TempDir::new().unwrap();
        let mut source = source();
        source.failing_selects.push("orders".to_string());
        let mut orchestrator = MigrationOrchestrator::new(MigrationOptions::default());

        let err = orchestrator
            .export(&mut source, dir.path())
            .await
            .unwrap_err();

        assert_eq!(err.table(), Some("orders"));
        assert_eq!(orchestrator.state(), MigrationState::Failed);
        assert!(!dir.path().join(MANIFEST_FILE).exists());
    }

    #[tokio::test]
    async fn test_import_without_manifest_writes_nothing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("users.json"),
            r#"[{"id":1,"name":"Ann"}]"#,
        )
        .unwrap();
        let mut target = empty_target();
        let mut orchestrator = MigrationOrchestrator::new(MigrationOptions::default());

        let err = orchestrator
            .import(&mut target, dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, MigrationError::ManifestMissing { .. }));
        assert_eq!(target.begins, 0);
        assert!(target.rows("users").is_empty());
        assert_eq!(orchestrator.state(), MigrationState::Failed);
    }

    #[tokio::test]
    async fn test_table_filter_keeps_manifest_order() {
        let dir = TempDir::new().unwrap();
        let mut source = source();
        MigrationOrchestrator::new(MigrationOptions::default())
            .export(&mut source, dir.path())
            .await
            .unwrap();

        let mut target = empty_target();
        let mut orchestrator = MigrationOrchestrator::new(MigrationOptions {
            table_filter: TableFilter {
                include: Some(vec!["orders".to_string()]),
                exclude: vec![],
            },
            ..Default::default()
        });
        let summary = orchestrator.import(&mut target, dir.path()).await.unwrap();

        assert_eq!(summary.table_names(), vec!["orders"]);
        assert!(target.rows("users").is_empty());
        assert_eq!(target.rows("orders").len(), 5);
    }

    #[tokio::test]
    async fn test_steps_out_of_order_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut source = source();
        let mut orchestrator = MigrationOrchestrator::new(MigrationOptions::default());
        orchestrator.export(&mut source, dir.path()).await.unwrap();

        let err = orchestrator
            .export(&mut source, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Config(_)));
        assert_eq!(orchestrator.state(), MigrationState::Exported);
    }

    #[test]
    fn test_table_filter_allows() {
        let filter = TableFilter {
            include: None,
            exclude: vec!["audit".to_string()],
        };
        assert!(filter.allows("users"));
        assert!(!filter.allows("audit"));

        let tables = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let filter = TableFilter {
            include: Some(vec!["c".to_string(), "a".to_string()]),
            exclude: vec![],
        };
        assert_eq!(filter.apply(&tables), vec!["a", "c"]);
    }
}
