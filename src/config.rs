// ⚙️ Configuration - where the ledgers live and what their columns are called
//
// Lookup order: explicit path → $WRITEOFF_RECON_CONFIG → ./writeoff-recon.toml
// → built-in defaults. An explicitly requested file must exist.

use crate::error::{ReconError, Result};
use crate::reconciliation::{
    ReconciliationEngine, DEFAULT_AMOUNT_REPAID_HEADER, DEFAULT_MATCH_COUNT_HEADER,
};
use crate::schema::{ColumnSpec, TableSchema};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "WRITEOFF_RECON_CONFIG";
pub const CONFIG_FILENAME: &str = "writeoff-recon.toml";
pub const DEFAULT_EXPORT_FILENAME: &str = "writeoffs_with_match_counts.csv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub repayments: SourceConfig,
    pub writeoffs: SourceConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub path: PathBuf,
    /// Column holding the phone number used as join key.
    pub key: ColumnSpec,
    pub amount: ColumnSpec,
}

impl SourceConfig {
    fn new(path: &str, schema: TableSchema) -> Self {
        SourceConfig {
            path: PathBuf::from(path),
            key: schema.key,
            amount: schema.amount,
        }
    }

    pub fn schema(&self) -> TableSchema {
        TableSchema {
            key: self.key.clone(),
            amount: self.amount.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub match_count_header: String,
    pub amount_repaid_header: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            repayments: SourceConfig::new("Repayments.xlsx", TableSchema::repayments()),
            writeoffs: SourceConfig::new("writeoffs.xlsx", TableSchema::writeoffs()),
            output: OutputConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            path: PathBuf::from(DEFAULT_EXPORT_FILENAME),
            match_count_header: DEFAULT_MATCH_COUNT_HEADER.to_string(),
            amount_repaid_header: DEFAULT_AMOUNT_REPAID_HEADER.to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// Resolve and load the configuration. `explicit` comes from `--config`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_at_path(path, true).map(Option::unwrap_or_default);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Self::load_at_path(Path::new(&path), true).map(Option::unwrap_or_default);
        }
        Self::load_at_path(Path::new(CONFIG_FILENAME), false).map(Option::unwrap_or_default)
    }

    fn load_at_path(path: &Path, required: bool) -> Result<Option<Self>> {
        if !path.exists() {
            if required {
                return Err(ReconError::MissingConfigFile(path.to_path_buf()));
            }
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ReconError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&contents).map_err(|source| ReconError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.resolve_relative_to(path.parent().unwrap_or_else(|| Path::new("")));
        log::info!("loaded config from {}", path.display());
        Ok(Some(config))
    }

    pub fn from_toml(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Relative data paths in a config file are relative to that file.
    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [
            &mut self.repayments.path,
            &mut self.writeoffs.path,
            &mut self.output.path,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Engine wired with this config's schemas, labels and output headers.
    pub fn engine(&self) -> ReconciliationEngine {
        ReconciliationEngine {
            repayments_schema: self.repayments.schema(),
            writeoffs_schema: self.writeoffs.schema(),
            repayments_label: file_label(&self.repayments.path),
            writeoffs_label: file_label(&self.writeoffs.path),
            match_count_header: self.output.match_count_header.clone(),
            amount_repaid_header: self.output.amount_repaid_header.clone(),
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
