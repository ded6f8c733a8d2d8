// ABOUTME: Row-count validation between source and target connections
// ABOUTME: Records mismatches and count failures in a report instead of failing

use crate::database::Database;
use serde::Serialize;
use std::fmt;

/// Outcome of comparing one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableValidation {
    pub table: String,
    pub source_count: Option<i64>,
    pub target_count: Option<i64>,
    pub matches: bool,
    /// Why a count could not be taken
    pub error: Option<String>,
}

/// Per-table validation results in table-list order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub tables: Vec<TableValidation>,
}

impl ValidationReport {
    /// True when every table's counts were taken and agree
    pub fn passed(&self) -> bool {
        self.tables.iter().all(|t| t.matches)
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &TableValidation> {
        self.tables.iter().filter(|t| !t.matches)
    }

    pub fn get(&self, table: &str) -> Option<&TableValidation> {
        self.tables.iter().find(|t| t.table == table)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in &self.tables {
            let count = |c: Option<i64>| c.map_or_else(|| "?".to_string(), |c| c.to_string());
            let mark = if t.matches { "✓" } else { "✗" };
            write!(
                f,
                "{} {}: source={} target={}",
                mark,
                t.table,
                count(t.source_count),
                count(t.target_count)
            )?;
            if let Some(error) = &t.error {
                write!(f, " ({})", error)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Compare `SELECT COUNT(*)` for each table on both sides
///
/// Never fails: a count that cannot be taken is recorded as the table's
/// error and the table is marked as not matching. Row contents are not
/// compared.
pub async fn validate_tables(
    source: &mut dyn Database,
    target: &mut dyn Database,
    tables: &[String],
) -> ValidationReport {
    let mut report = ValidationReport::default();

    for table in tables {
        let source_count = source.count_rows(table).await;
        let target_count = target.count_rows(table).await;

        let mut errors = Vec::new();
        if let Err(e) = &source_count {
            errors.push(format!("source: {:#}", e));
        }
        if let Err(e) = &target_count {
            errors.push(format!("target: {:#}", e));
        }

        let source_count = source_count.ok();
        let target_count = target_count.ok();
        let matches = errors.is_empty() && source_count == target_count;

        if matches {
            tracing::info!("✓ {}: {} rows on both sides", table, source_count.unwrap_or(0));
        } else if errors.is_empty() {
            tracing::warn!(
                "✗ {}: source has {:?} rows, target has {:?}",
                table,
                source_count,
                target_count
            );
        } else {
            tracing::warn!("✗ {}: could not count rows: {}", table, errors.join("; "));
        }

        report.tables.push(TableValidation {
            table: table.clone(),
            source_count,
            target_count,
            matches,
            error: (!errors.is_empty()).then(|| errors.join("; ")),
        });
    }

    report
}
