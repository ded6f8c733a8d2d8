// ABOUTME: Validation operation comparing row counts of every source table on both sides
// ABOUTME: Succeeds only when every table's counts match

use super::{close_connection, connect_pair, OperationResult};
use crate::config::ConnectionParams;
use crate::error::MigrationError;
use crate::migration::{list_tables, ValidationReport};
use crate::orchestrator::{MigrationOptions, MigrationOrchestrator};

/// Compare row counts of the source's user tables against the target
///
/// The report is attached whether or not the counts match.
pub async fn validate_only(
    source: &ConnectionParams,
    target: &ConnectionParams,
    options: &MigrationOptions,
) -> OperationResult {
    match run(source, target, options).await {
        Ok(report) => {
            let checked = report.tables.len();
            let result = if report.passed() {
                OperationResult::success(format!("All {} tables have matching row counts", checked))
            } else {
                OperationResult::failure(format!(
                    "{} of {} tables differ between source and target",
                    report.mismatches().count(),
                    checked
                ))
            };
            result.with_report(report)
        }
        Err(e) => OperationResult::from_error("Validation", &e),
    }
}

async fn run(
    source: &ConnectionParams,
    target: &ConnectionParams,
    options: &MigrationOptions,
) -> Result<ValidationReport, MigrationError> {
    let (mut source_db, mut target_db) = connect_pair(source, target).await?;

    let result = async {
        let tables: Vec<String> = list_tables(source_db.as_mut())
            .await?
            .into_iter()
            .filter(|table| options.table_filter.allows(table))
            .collect();
        MigrationOrchestrator::new(options.clone())
            .validate(source_db.as_mut(), target_db.as_mut(), &tables)
            .await
    }
    .await;

    close_connection(source_db).await;
    close_connection(target_db).await;
    result
}
