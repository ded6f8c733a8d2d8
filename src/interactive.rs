// ABOUTME: Interactive terminal prompts for choosing and confirming imports
// ABOUTME: Multi-select over the manifest's tables plus a final confirmation

use crate::config::ConnectionParams;
use crate::migration::MigrationManifest;
use crate::orchestrator::TableFilter;
use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, MultiSelect};
use std::path::Path;

/// Let the operator pick which tables of an export directory to import
///
/// All tables start selected. Selecting every table yields an empty filter;
/// deselecting some yields an `include` list in manifest order.
///
/// # Errors
///
/// Fails if the manifest cannot be read or the terminal prompt fails.
pub fn select_tables(input_dir: &Path) -> Result<TableFilter> {
    let manifest = MigrationManifest::read(input_dir)?;
    tracing::info!(
        "Export from {} taken {} contains {} table(s)",
        manifest.source_database,
        manifest.export_timestamp,
        manifest.tables.len()
    );
    tracing::info!("");

    if manifest.tables.is_empty() {
        tracing::warn!("⚠ Manifest lists no tables");
        return Ok(TableFilter::default());
    }

    println!("Select tables to import (parents before children):");
    println!("(Use arrow keys to navigate, Space to select, Enter to confirm)");
    println!();

    let defaults = vec![true; manifest.tables.len()];
    let selections = MultiSelect::with_theme(&ColorfulTheme::default())
        .items(&manifest.tables)
        .defaults(&defaults)
        .interact()
        .context("Failed to get table selection")?;

    if selections.len() == manifest.tables.len() {
        tracing::info!("✓ Importing all {} table(s)", selections.len());
        return Ok(TableFilter::default());
    }

    let include: Vec<String> = selections
        .iter()
        .map(|&idx| manifest.tables[idx].clone())
        .collect();
    tracing::info!("✓ Selected {} table(s):", include.len());
    for table in &include {
        tracing::info!("  - {}", table);
    }
    tracing::info!("");

    Ok(TableFilter {
        include: Some(include),
        exclude: Vec::new(),
    })
}

/// Ask before writing rows into `target`
pub fn confirm_import(target: &ConnectionParams, filter: &TableFilter) -> Result<bool> {
    let scope = match &filter.include {
        Some(tables) => format!("{} selected table(s)", tables.len()),
        None => "every exported table".to_string(),
    };
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Import {} into {}? Existing rows are not replaced.",
            scope,
            target.endpoint()
        ))
        .default(false)
        .interact()
        .context("Failed to get confirmation")
}
