// 🚨 Error taxonomy for the reconciliation pipeline
// Every variant is fatal: it is reported once and processing stops.
// Bad cell values never end up here, they degrade to 0 / "" instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// One or more input files are absent. Names every missing file at once.
    #[error("Missing required file(s): {}. Place them next to the configured paths and reload.", .0.join(", "))]
    MissingFiles(Vec<String>),

    /// A required column is not present in a table (by name).
    #[error("Expected '{column}' column{position} in {table}.")]
    MissingColumn {
        table: String,
        column: String,
        /// Pre-rendered " (column S)" clause, empty when no position is expected.
        position: String,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to read workbook {path}: {message}")]
    Workbook { path: PathBuf, message: String },

    #[error("unsupported file type for {0} (expected .csv, .xlsx, .xlsm, .xls or .ods)")]
    UnsupportedFormat(PathBuf),

    #[error("failed to write CSV: {0}")]
    Export(String),

    #[error("config file not found: {0}")]
    MissingConfigFile(PathBuf),

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ReconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_lists_every_name() {
        let err = ReconError::MissingFiles(vec![
            "Repayments.xlsx".to_string(),
            "writeoffs.xlsx".to_string(),
        ]);
        let message = err.to_string();
        assert!(message.starts_with("Missing required file(s): Repayments.xlsx, writeoffs.xlsx."));
    }

    #[test]
    fn missing_column_names_column_and_table() {
        let err = ReconError::MissingColumn {
            table: "writeoffs.xlsx".to_string(),
            column: "mobile".to_string(),
            position: " (column D)".to_string(),
        };
        assert_eq!(err.to_string(), "Expected 'mobile' column (column D) in writeoffs.xlsx.");
    }
}
