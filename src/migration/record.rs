// ABOUTME: JSON codec for per-table record files in an export directory
// ABOUTME: Derives the record file path from a table name and reads/writes row arrays

use crate::utils;
use crate::value::Row;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Serializer settings shared by the exporter and importer of one run
///
/// Constructed by the caller and passed down explicitly; there is no global
/// serializer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCodec {
    /// Indent JSON output for human inspection
    pub pretty: bool,
}

impl Default for RecordCodec {
    fn default() -> Self {
        RecordCodec { pretty: true }
    }
}

impl RecordCodec {
    pub fn new(pretty: bool) -> Self {
        RecordCodec { pretty }
    }

    /// `<dir>/<table>.json`, after checking the name cannot escape `dir`
    pub fn record_path(&self, dir: &Path, table: &str) -> Result<PathBuf> {
        utils::validate_table_name(table)?;
        Ok(dir.join(format!("{}.json", table)))
    }

    /// Write `rows` as a JSON array, replacing any existing file
    pub fn write_rows(&self, path: &Path, rows: &[Row]) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create record file {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        let written = if self.pretty {
            serde_json::to_writer_pretty(&mut writer, rows)
        } else {
            serde_json::to_writer(&mut writer, rows)
        };
        written.with_context(|| format!("Failed to serialize rows to {}", path.display()))?;

        writer.write_all(b"\n")?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush record file {}", path.display()))?;
        Ok(())
    }

    /// Read a JSON array of row objects
    ///
    /// An empty or whitespace-only file holds no rows.
    pub fn read_rows(&self, path: &Path) -> Result<Vec<Row>> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read record file {}", path.display()))?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&contents)
            .with_context(|| format!("Record file {} is not a JSON array of rows", path.display()))
    }
}
