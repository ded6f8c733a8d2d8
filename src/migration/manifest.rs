// ABOUTME: Migration manifest tying an export directory together
// ABOUTME: Records source, target, timestamp, and the ordered table list that drives import

use crate::error::MigrationError;
use anyhow::Context;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the manifest inside an export directory
pub const MANIFEST_FILE: &str = "metadata.json";

mod timestamp_format {
    use crate::value::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Contents of `metadata.json`
///
/// Written last by an export, so its presence marks a complete export
/// directory. `tables` keeps catalog discovery order and import follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationManifest {
    #[serde(with = "timestamp_format")]
    pub export_timestamp: NaiveDateTime,
    pub source_database: String,
    pub target_database: String,
    pub tables: Vec<String>,
    pub table_count: usize,
}

impl MigrationManifest {
    pub fn new(
        tables: Vec<String>,
        source_database: impl Into<String>,
        target_database: impl Into<String>,
    ) -> Self {
        MigrationManifest {
            export_timestamp: chrono::Local::now().naive_local(),
            source_database: source_database.into(),
            target_database: target_database.into(),
            table_count: tables.len(),
            tables,
        }
    }

    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    /// Write the manifest into `dir`
    pub fn write(&self, dir: &Path) -> Result<PathBuf, MigrationError> {
        let path = Self::path_in(dir);
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize migration manifest")
            .map_err(|e| MigrationError::io(&path, e))?;
        std::fs::write(&path, json + "\n")
            .with_context(|| format!("Failed to write {}", MANIFEST_FILE))
            .map_err(|e| MigrationError::io(&path, e))?;

        tracing::info!(
            "✓ Wrote manifest for {} tables to {}",
            self.table_count,
            path.display()
        );
        Ok(path)
    }

    /// Read the manifest from `dir`
    ///
    /// A `tableCount` that disagrees with the table list is logged and the
    /// list wins.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::ManifestMissing`] if `dir` has no manifest
    /// - [`MigrationError::ManifestInvalid`] if it cannot be read or parsed
    pub fn read(dir: &Path) -> Result<Self, MigrationError> {
        let path = Self::path_in(dir);
        if !path.is_file() {
            return Err(MigrationError::ManifestMissing { path });
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                return Err(MigrationError::ManifestInvalid {
                    path,
                    cause: e.into(),
                })
            }
        };
        let manifest: MigrationManifest = match serde_json::from_str(&contents) {
            Ok(manifest) => manifest,
            Err(e) => {
                return Err(MigrationError::ManifestInvalid {
                    path,
                    cause: e.into(),
                })
            }
        };

        if manifest.table_count != manifest.tables.len() {
            tracing::warn!(
                "Manifest {} declares {} tables but lists {}; using the list",
                path.display(),
                manifest.table_count,
                manifest.tables.len()
            );
        }
        Ok(manifest)
    }
}
