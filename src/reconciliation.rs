// ⚖️ Reconciliation Engine - Write-offs vs Repayments
//
// 1. aggregate(): repayments → per-key match count + summed repaid amount
// 2. apply():     write-offs → copy + two derived columns + summary scalars
//
// Single pass, no state between runs. A missing required column aborts the
// whole run; bad cells degrade to 0 / "" and stay in the totals.

use crate::error::Result;
use crate::normalize::{coerce_amount, normalize_key, FieldValue, PhoneKey};
use crate::schema::{SchemaWarning, TableSchema};
use crate::table::Table;
use serde::Serialize;
use std::collections::HashMap;

pub const DEFAULT_MATCH_COUNT_HEADER: &str = "Repayment Phone Matches";
pub const DEFAULT_AMOUNT_REPAID_HEADER: &str = "amount repayed";

// ============================================================================
// AGGREGATES
// ============================================================================

/// Lookup tables built from the repayments ledger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhoneAggregates {
    pub counts: HashMap<PhoneKey, usize>,
    pub sums: HashMap<PhoneKey, f64>,
}

impl PhoneAggregates {
    /// Repayment rows sharing `key`; 0 for keys never seen.
    pub fn match_count(&self, key: &PhoneKey) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Summed repaid amount for `key`; 0.0 for keys never seen.
    pub fn amount_repaid(&self, key: &PhoneKey) -> f64 {
        self.sums.get(key).copied().unwrap_or(0.0)
    }

    pub fn total_rows(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn distinct_keys(&self) -> usize {
        self.counts.len()
    }
}

// ============================================================================
// TOTALS & REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WriteoffTotals {
    pub writeoff_count: usize,
    pub total_written_off: f64,
    pub total_repaid_for_writeoffs: f64,
    pub percent_repaid: f64,
}

impl WriteoffTotals {
    fn compute(writeoff_count: usize, total_written_off: f64, total_repaid: f64) -> Self {
        // Nothing written off means nothing to recover: 0%, not a division error.
        let percent_repaid = if total_written_off > 0.0 {
            total_repaid / total_written_off * 100.0
        } else {
            0.0
        };

        WriteoffTotals {
            writeoff_count,
            total_written_off,
            total_repaid_for_writeoffs: total_repaid,
            percent_repaid,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    /// Write-offs plus the match count and amount repaid columns.
    pub augmented: Table,
    pub totals: WriteoffTotals,
    /// Write-off rows with at least one matching repayment.
    pub matched_rows: usize,
    pub warnings: Vec<SchemaWarning>,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

impl ReconciliationReport {
    pub fn summary(&self) -> String {
        format!(
            "Reconciliation: {} write-offs ({} matched), written off {:.2}, repaid {:.2} ({:.2}%)",
            self.totals.writeoff_count,
            self.matched_rows,
            self.totals.total_written_off,
            self.totals.total_repaid_for_writeoffs,
            self.totals.percent_repaid
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    pub repayments_schema: TableSchema,
    pub writeoffs_schema: TableSchema,
    /// Labels used in error messages (usually the source file names).
    pub repayments_label: String,
    pub writeoffs_label: String,
    pub match_count_header: String,
    pub amount_repaid_header: String,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine {
            repayments_schema: TableSchema::repayments(),
            writeoffs_schema: TableSchema::writeoffs(),
            repayments_label: "Repayments.xlsx".to_string(),
            writeoffs_label: "writeoffs.xlsx".to_string(),
            match_count_header: DEFAULT_MATCH_COUNT_HEADER.to_string(),
            amount_repaid_header: DEFAULT_AMOUNT_REPAID_HEADER.to_string(),
        }
    }

    /// Build the count and sum tables from the repayments ledger.
    ///
    /// Every row lands in exactly one bucket, including the "" bucket for
    /// rows whose phone field carries no digits.
    pub fn aggregate(
        &self,
        repayments: &Table,
        warnings: &mut Vec<SchemaWarning>,
    ) -> Result<PhoneAggregates> {
        let cols = self
            .repayments_schema
            .resolve(repayments, &self.repayments_label, warnings)?;

        let mut aggregates = PhoneAggregates::default();
        for row in 0..repayments.len() {
            let key = normalize_key(repayments.cell(row, cols.key));
            let amount = coerce_amount(repayments.cell(row, cols.amount));

            *aggregates.counts.entry(key.clone()).or_insert(0) += 1;
            *aggregates.sums.entry(key).or_insert(0.0) += amount;
        }

        log::info!(
            "aggregated {} repayment rows into {} phone keys",
            repayments.len(),
            aggregates.distinct_keys()
        );
        Ok(aggregates)
    }

    /// Attach match count and amount repaid to a copy of the write-offs and
    /// compute the summary scalars. The input table is left untouched.
    pub fn apply(
        &self,
        writeoffs: &Table,
        aggregates: &PhoneAggregates,
        warnings: &mut Vec<SchemaWarning>,
    ) -> Result<(Table, WriteoffTotals)> {
        let cols = self
            .writeoffs_schema
            .resolve(writeoffs, &self.writeoffs_label, warnings)?;

        let mut counts = Vec::with_capacity(writeoffs.len());
        let mut repaid = Vec::with_capacity(writeoffs.len());
        let mut total_written_off = 0.0;
        let mut total_repaid = 0.0;

        for row in 0..writeoffs.len() {
            let key = normalize_key(writeoffs.cell(row, cols.key));
            let amount_repaid = aggregates.amount_repaid(&key);

            counts.push(FieldValue::Integer(aggregates.match_count(&key) as i64));
            repaid.push(FieldValue::Number(amount_repaid));

            total_written_off += coerce_amount(writeoffs.cell(row, cols.amount));
            total_repaid += amount_repaid;
        }

        let mut augmented = writeoffs.clone();
        augmented.push_column(&self.match_count_header, counts);
        augmented.push_column(&self.amount_repaid_header, repaid);

        let totals = WriteoffTotals::compute(writeoffs.len(), total_written_off, total_repaid);
        Ok((augmented, totals))
    }

    /// Full pipeline: aggregate repayments, then apply to write-offs.
    pub fn reconcile(&self, repayments: &Table, writeoffs: &Table) -> Result<ReconciliationReport> {
        let mut warnings = Vec::new();
        let aggregates = self.aggregate(repayments, &mut warnings)?;
        let (augmented, totals) = self.apply(writeoffs, &aggregates, &mut warnings)?;

        let count_col = augmented.headers.len() - 2;
        let matched_rows = augmented
            .column_values(count_col)
            .filter(|v| matches!(v, FieldValue::Integer(n) if *n > 0))
            .count();

        let report = ReconciliationReport {
            augmented,
            totals,
            matched_rows,
            warnings,
            generated_at: chrono::Utc::now(),
        };
        log::info!("{}", report.summary());
        Ok(report)
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconError;
    use crate::normalize::normalize_text;

    fn repayments(rows: &[(&str, &str)]) -> Table {
        let mut table = Table::new(vec!["Phone Number".to_string(), "Total Repaid:".to_string()]);
        for (phone, amount) in rows {
            table.rows.push(vec![FieldValue::from(*phone), FieldValue::from(*amount)]);
        }
        table
    }

    fn writeoffs(rows: &[(&str, &str)]) -> Table {
        let mut table = Table::new(vec![
            "id".to_string(),
            "name".to_string(),
            "branch".to_string(),
            "mobile".to_string(),
            "Total Writtenoff Derived".to_string(),
        ]);
        for (i, (mobile, amount)) in rows.iter().enumerate() {
            table.rows.push(vec![
                FieldValue::Text(i.to_string()),
                FieldValue::Text(format!("Borrower {}", i)),
                FieldValue::Text("Arusha".to_string()),
                FieldValue::from(*mobile),
                FieldValue::from(*amount),
            ]);
        }
        table
    }

    #[test]
    fn test_end_to_end_scenario() {
        let engine = ReconciliationEngine::new();
        let repay = repayments(&[("0712345678", "100"), ("255712345678", "50")]);
        let wo = Table::from_strings(
            &["mobile", "Total Writtenoff Derived"],
            &[&["+255712345678", "200"]],
        );

        let mut warnings = Vec::new();
        let aggregates = engine.aggregate(&repay, &mut warnings).unwrap();
        let key = normalize_text("712345678");
        assert_eq!(aggregates.counts[&key], 2);
        assert_eq!(aggregates.sums[&key], 150.0);

        let (augmented, totals) = engine.apply(&wo, &aggregates, &mut warnings).unwrap();
        assert_eq!(augmented.headers.len(), 4);
        assert_eq!(augmented.cell(0, 2), &FieldValue::Integer(2));
        assert_eq!(augmented.cell(0, 3), &FieldValue::Number(150.0));
        assert_eq!(totals.writeoff_count, 1);
        assert_eq!(totals.total_written_off, 200.0);
        assert_eq!(totals.total_repaid_for_writeoffs, 150.0);
        assert_eq!(totals.percent_repaid, 75.0);
    }

    #[test]
    fn test_count_table_sums_to_row_count() {
        let engine = ReconciliationEngine::new();
        let repay = repayments(&[
            ("0712345678", "10"),
            ("", "5"),
            ("N/A", "x"),
            ("0788000111", "1"),
            ("255712345678", ""),
        ]);

        let aggregates = engine.aggregate(&repay, &mut Vec::new()).unwrap();
        assert_eq!(aggregates.total_rows(), repay.len());
        // Blank and non-numeric phones share the empty bucket.
        assert_eq!(aggregates.match_count(&PhoneKey::default()), 2);
        assert_eq!(aggregates.amount_repaid(&PhoneKey::default()), 5.0);
        // Unparseable amount counted as 0, row still counted.
        assert_eq!(aggregates.match_count(&normalize_text("712345678")), 2);
        assert_eq!(aggregates.amount_repaid(&normalize_text("712345678")), 10.0);
    }

    #[test]
    fn test_match_count_equals_direct_scan() {
        let engine = ReconciliationEngine::new();
        let repay_rows = [
            ("0712345678", "10"),
            ("+255 712 345 678", "20"),
            ("0788000111", "5"),
            ("abc", "1"),
        ];
        let repay = repayments(&repay_rows);
        let wo = writeoffs(&[
            ("712345678", "100"),
            ("0788000111", "50"),
            ("0799999999", "25"),
            ("", "10"),
        ]);

        let report = engine.reconcile(&repay, &wo).unwrap();
        let count_col = report.augmented.headers.len() - 2;

        for row in 0..wo.len() {
            let key = normalize_key(wo.cell(row, 3));
            let expected = repay_rows
                .iter()
                .filter(|(phone, _)| normalize_text(phone) == key)
                .count();
            assert_eq!(
                report.augmented.cell(row, count_col),
                &FieldValue::Integer(expected as i64)
            );
        }
        assert_eq!(report.matched_rows, 3);
    }

    #[test]
    fn test_unmatched_writeoff_gets_zeroes() {
        let engine = ReconciliationEngine::new();
        let repay = repayments(&[("0712345678", "10")]);
        let wo = writeoffs(&[("0799999999", "25")]);

        let report = engine.reconcile(&repay, &wo).unwrap();
        let cols = report.augmented.headers.len();
        assert_eq!(report.augmented.cell(0, cols - 2), &FieldValue::Integer(0));
        assert_eq!(report.augmented.cell(0, cols - 1), &FieldValue::Number(0.0));
        assert_eq!(report.totals.percent_repaid, 0.0);
        assert_eq!(report.matched_rows, 0);
    }

    #[test]
    fn test_percent_is_zero_when_nothing_written_off() {
        let engine = ReconciliationEngine::new();
        let repay = repayments(&[("0712345678", "500")]);
        let wo = writeoffs(&[("0712345678", "0"), ("0712345678", "not a number")]);

        let report = engine.reconcile(&repay, &wo).unwrap();
        assert_eq!(report.totals.total_written_off, 0.0);
        assert_eq!(report.totals.total_repaid_for_writeoffs, 1000.0);
        assert_eq!(report.totals.percent_repaid, 0.0);
    }

    #[test]
    fn test_apply_does_not_mutate_source() {
        let engine = ReconciliationEngine::new();
        let repay = repayments(&[("0712345678", "10")]);
        let wo = writeoffs(&[("0712345678", "25")]);
        let before = wo.clone();

        let report = engine.reconcile(&repay, &wo).unwrap();
        assert_eq!(wo, before);
        assert_eq!(report.augmented.headers[..5], before.headers[..]);
        assert_eq!(report.augmented.headers[5], DEFAULT_MATCH_COUNT_HEADER);
        assert_eq!(report.augmented.headers[6], DEFAULT_AMOUNT_REPAID_HEADER);
        assert_eq!(report.augmented.rows[0][..5], before.rows[0][..]);
    }

    #[test]
    fn test_missing_mobile_column_is_fatal() {
        let engine = ReconciliationEngine::new();
        let repay = repayments(&[("0712345678", "10")]);
        let wo = Table::from_strings(&["phone", "Total Writtenoff Derived"], &[&["0712345678", "1"]]);

        let err = engine.reconcile(&repay, &wo).unwrap_err();
        assert!(matches!(err, ReconError::MissingColumn { ref column, .. } if column == "mobile"));
        assert!(err.to_string().contains("'mobile'"));
    }

    #[test]
    fn test_missing_repayment_columns_are_fatal() {
        let engine = ReconciliationEngine::new();
        let wo = writeoffs(&[("0712345678", "25")]);

        let no_phone = Table::from_strings(&["Total Repaid:"], &[&["1"]]);
        let err = engine.reconcile(&no_phone, &wo).unwrap_err();
        assert!(err.to_string().contains("'Phone Number' column (column S)"));

        let no_amount = Table::from_strings(&["Phone Number"], &[&["1"]]);
        let err = engine.reconcile(&no_amount, &wo).unwrap_err();
        assert!(err.to_string().contains("'Total Repaid:'"));
    }

    #[test]
    fn test_missing_written_off_column_is_fatal() {
        let engine = ReconciliationEngine::new();
        let repay = repayments(&[("0712345678", "10")]);
        let wo = Table::from_strings(&["a", "b", "c", "mobile"], &[&["", "", "", "0712345678"]]);

        let err = engine.reconcile(&repay, &wo).unwrap_err();
        assert!(err.to_string().contains("'Total Writtenoff Derived'"));
    }

    #[test]
    fn test_misplaced_columns_collect_warnings() {
        let engine = ReconciliationEngine::new();
        // Phone Number at index 0 instead of 18; mobile at index 3 as expected.
        let repay = repayments(&[("0712345678", "10")]);
        let wo = writeoffs(&[("0712345678", "10")]);

        let report = engine.reconcile(&repay, &wo).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].column, "Phone Number");
        assert_eq!(report.totals.percent_repaid, 100.0);
    }

    #[test]
    fn test_empty_bucket_collides_across_tables() {
        let engine = ReconciliationEngine::new();
        let repay = repayments(&[("", "10"), ("N/A", "20")]);
        let wo = writeoffs(&[("unknown", "60")]);

        let report = engine.reconcile(&repay, &wo).unwrap();
        let cols = report.augmented.headers.len();
        assert_eq!(report.augmented.cell(0, cols - 2), &FieldValue::Integer(2));
        assert_eq!(report.augmented.cell(0, cols - 1), &FieldValue::Number(30.0));
        assert_eq!(report.totals.percent_repaid, 50.0);
    }

    #[test]
    fn test_report_summary() {
        let engine = ReconciliationEngine::new();
        let repay = repayments(&[("0712345678", "100"), ("255712345678", "50")]);
        let wo = writeoffs(&[("+255712345678", "200")]);

        let report = engine.reconcile(&repay, &wo).unwrap();
        assert_eq!(
            report.summary(),
            "Reconciliation: 1 write-offs (1 matched), written off 200.00, repaid 150.00 (75.00%)"
        );
    }
}
