// Write-off Reconciliation - Core Library
// Matches a write-off ledger against a repayment ledger on the last nine
// digits of the borrower's phone number. Used by the CLI, the TUI and the
// API server.

pub mod error;
pub mod normalize;
pub mod table;
pub mod schema;
pub mod loader;
pub mod reconciliation;
pub mod report;
pub mod config;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use error::{ReconError, Result};
pub use normalize::{coerce_amount, normalize_key, normalize_text, FieldValue, PhoneKey, KEY_DIGITS};
pub use table::{load_csv, load_table, load_workbook, read_csv, read_workbook, SourceFormat, Table};
pub use schema::{
    column_letter, ColumnSpec, ResolvedColumns, SchemaWarning, TableSchema,
    REPAYMENT_PHONE_INDEX, WRITEOFF_MOBILE_INDEX,
};
pub use loader::{check_sources_exist, load_sources, CacheOutcome, LoadCache, SourceTables};
pub use reconciliation::{
    PhoneAggregates, ReconciliationEngine, ReconciliationReport, WriteoffTotals,
};
pub use report::{format_amount, format_count, format_percent, kpi_cards, KpiCard};
pub use config::{AppConfig, DEFAULT_EXPORT_FILENAME};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Load both ledgers named in `config` through `cache` and reconcile them.
///
/// Missing files and missing columns abort with a single error; nothing is
/// produced in that case.
pub fn run_pipeline(config: &AppConfig, cache: &LoadCache) -> Result<ReconciliationReport> {
    let sources = load_sources(cache, &config.repayments.path, &config.writeoffs.path)?;
    config.engine().reconcile(&sources.repayments, &sources.writeoffs)
}
