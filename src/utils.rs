// ABOUTME: Utility functions for validation and export-directory handling
// ABOUTME: Provides table-name safety checks, display sanitizing, and temp directory naming

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Validate that a table name can safely become a record file name
///
/// Record files are written as `<table>.json` directly inside the export
/// directory, so a name must never be able to point outside it.
///
/// # Errors
///
/// Returns an error if the name is:
/// - Empty or whitespace only
/// - Contains a path separator (`/` or `\`)
/// - Contains `..`
/// - Contains control characters (including NUL)
///
/// # Examples
///
/// ```
/// # use relational_migrator::utils::validate_table_name;
/// assert!(validate_table_name("users").is_ok());
/// assert!(validate_table_name("audit.events").is_ok());
/// assert!(validate_table_name("../etc/passwd").is_err());
/// assert!(validate_table_name("").is_err());
/// ```
pub fn validate_table_name(table: &str) -> Result<()> {
    if table.trim().is_empty() {
        bail!("Table name cannot be empty");
    }

    if table.contains('/') || table.contains('\\') {
        bail!(
            "Table name '{}' contains a path separator",
            sanitize_identifier(table)
        );
    }

    if table.contains("..") {
        bail!(
            "Table name '{}' contains '..' and could escape the export directory",
            sanitize_identifier(table)
        );
    }

    if table.chars().any(|c| c.is_control()) {
        bail!(
            "Table name '{}' contains control characters",
            sanitize_identifier(table)
        );
    }

    Ok(())
}

/// Sanitize an identifier (table name, column name, etc.) for display
///
/// Removes control characters and limits length to keep log lines readable.
///
/// **Note**: This is for display purposes only. SQL values are always bound
/// as parameters and identifiers are quoted by the driver's vendor.
///
/// # Examples
///
/// ```
/// # use relational_migrator::utils::sanitize_identifier;
/// assert_eq!(sanitize_identifier("normal_table"), "normal_table");
/// assert_eq!(sanitize_identifier("table\x00name"), "tablename");
///
/// let long_name = "a".repeat(200);
/// assert_eq!(sanitize_identifier(&long_name).len(), 100);
/// ```
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !c.is_control())
        .take(100)
        .collect()
}

/// Create a fresh timestamped directory under the system temp directory
///
/// The directory is named `<prefix>_<yyyyMMdd_HHmmss>`, e.g.
/// `/tmp/mysql_export_20240102_030405`.
pub fn generate_output_dir(prefix: &str) -> Result<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let dir = std::env::temp_dir().join(format!("{}_{}", prefix, stamp));

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_table_name_valid() {
        assert!(validate_table_name("users").is_ok());
        assert!(validate_table_name("order_items").is_ok());
        assert!(validate_table_name("sales.orders").is_ok());
        assert!(validate_table_name("Ünïcode").is_ok());
    }

    #[test]
    fn test_validate_table_name_invalid() {
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("   ").is_err());
        assert!(validate_table_name("a/b").is_err());
        assert!(validate_table_name("a\\b").is_err());
        assert!(validate_table_name("..").is_err());
        assert!(validate_table_name("x..y").is_err());
        assert!(validate_table_name("bad\0name").is_err());
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("normal_table"), "normal_table");
        assert_eq!(sanitize_identifier("table\x00name"), "tablename");
        assert_eq!(sanitize_identifier("table\nname"), "tablename");

        let long_name = "a".repeat(200);
        assert_eq!(sanitize_identifier(&long_name).len(), 100);
    }

    #[test]
    fn test_generate_output_dir_is_timestamped() {
        let dir = generate_output_dir("relational_migrator_test").unwrap();
        let name = dir.file_name().unwrap().to_string_lossy().into_owned();

        assert!(dir.is_dir());
        assert!(name.starts_with("relational_migrator_test_"));
        // prefix + '_' + yyyyMMdd_HHmmss
        assert_eq!(name.len(), "relational_migrator_test_".len() + 15);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
