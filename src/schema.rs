// 📐 Shape Layer - Column resolution for the two input tables
// Columns are found by exact header name. The conventional position is only
// a sanity check: finding a column elsewhere produces a warning, not an error.

use crate::error::{ReconError, Result};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// EXPECTED POSITIONS
// ============================================================================

/// "Phone Number" sits in spreadsheet column S of the repayments export.
pub const REPAYMENT_PHONE_INDEX: usize = 18;

/// "mobile" sits in spreadsheet column D of the write-offs export.
pub const WRITEOFF_MOBILE_INDEX: usize = 3;

pub const REPAYMENT_PHONE_COLUMN: &str = "Phone Number";
pub const REPAYMENT_AMOUNT_COLUMN: &str = "Total Repaid:";
pub const WRITEOFF_MOBILE_COLUMN: &str = "mobile";
pub const WRITEOFF_AMOUNT_COLUMN: &str = "Total Writtenoff Derived";

/// Spreadsheet column letter for a 0-based index (0 → A, 18 → S, 26 → AA).
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

// ============================================================================
// COLUMN SPEC
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(default)]
    pub expected_index: Option<usize>,
}

impl ColumnSpec {
    pub fn new(name: &str, expected_index: Option<usize>) -> Self {
        ColumnSpec {
            name: name.to_string(),
            expected_index,
        }
    }

    fn position_clause(&self) -> String {
        match self.expected_index {
            Some(idx) => format!(" (column {})", column_letter(idx)),
            None => String::new(),
        }
    }
}

/// The two columns the pipeline needs from one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSchema {
    pub key: ColumnSpec,
    pub amount: ColumnSpec,
}

impl TableSchema {
    pub fn repayments() -> Self {
        TableSchema {
            key: ColumnSpec::new(REPAYMENT_PHONE_COLUMN, Some(REPAYMENT_PHONE_INDEX)),
            amount: ColumnSpec::new(REPAYMENT_AMOUNT_COLUMN, None),
        }
    }

    pub fn writeoffs() -> Self {
        TableSchema {
            key: ColumnSpec::new(WRITEOFF_MOBILE_COLUMN, Some(WRITEOFF_MOBILE_INDEX)),
            amount: ColumnSpec::new(WRITEOFF_AMOUNT_COLUMN, None),
        }
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Non-fatal: the column exists but not where it usually is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaWarning {
    pub table: String,
    pub column: String,
    pub expected_index: usize,
    pub found_index: usize,
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' is not at expected column {}; proceeding with the named column.",
            self.column,
            column_letter(self.expected_index)
        )
    }
}

/// Column indices located in a concrete table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub key: usize,
    pub amount: usize,
}

/// Find a single column by name. `table_label` names the source in messages.
pub fn resolve_column(
    table: &Table,
    spec: &ColumnSpec,
    table_label: &str,
    warnings: &mut Vec<SchemaWarning>,
) -> Result<usize> {
    let found = table
        .column_index(&spec.name)
        .ok_or_else(|| ReconError::MissingColumn {
            table: table_label.to_string(),
            column: spec.name.clone(),
            position: spec.position_clause(),
        })?;

    if let Some(expected) = spec.expected_index {
        if found != expected {
            let warning = SchemaWarning {
                table: table_label.to_string(),
                column: spec.name.clone(),
                expected_index: expected,
                found_index: found,
            };
            log::warn!("{}: {}", table_label, warning);
            warnings.push(warning);
        }
    }

    Ok(found)
}

impl TableSchema {
    /// Resolve key then amount column; the first missing one aborts.
    pub fn resolve(
        &self,
        table: &Table,
        table_label: &str,
        warnings: &mut Vec<SchemaWarning>,
    ) -> Result<ResolvedColumns> {
        let key = resolve_column(table, &self.key, table_label, warnings)?;
        let amount = resolve_column(table, &self.amount, table_label, warnings)?;
        Ok(ResolvedColumns { key, amount })
    }
}

// ============================================================================
// TESTS
// ============================================================================
