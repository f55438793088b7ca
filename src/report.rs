// 📊 KPI cards - summary scalars formatted for people
// Thousands separators, two decimals, percent with a trailing '%'.

use crate::reconciliation::WriteoffTotals;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KpiCard {
    pub label: &'static str,
    pub value: String,
}

/// The four headline metrics, in display order.
pub fn kpi_cards(totals: &WriteoffTotals) -> [KpiCard; 4] {
    [
        KpiCard {
            label: "Number of write-offs",
            value: format_count(totals.writeoff_count),
        },
        KpiCard {
            label: "Total amount written off",
            value: format_amount(totals.total_written_off),
        },
        KpiCard {
            label: "Total repaid write-offs",
            value: format_amount(totals.total_repaid_for_writeoffs),
        },
        KpiCard {
            label: "% of repaid write-offs",
            value: format_percent(totals.percent_repaid),
        },
    ]
}

/// `1234567` → `1,234,567`
pub fn format_count(n: usize) -> String {
    group_thousands(&n.to_string())
}

/// `1234567.891` → `1,234,567.89`
pub fn format_amount(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    // Rounding can turn a tiny negative into "0.00"; don't print "-0.00".
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, group_thousands(int_part), frac_part)
}

/// `75.0` → `75.00%`
pub fn format_percent(value: f64) -> String {
    format!("{}%", format_amount(value))
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(200.0), "200.00");
        assert_eq!(format_amount(1234.5), "1,234.50");
        assert_eq!(format_amount(1234567.891), "1,234,567.89");
        assert_eq!(format_amount(-9876543.2), "-9,876,543.20");
        assert_eq!(format_amount(-0.001), "0.00");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(75.0), "75.00%");
        assert_eq!(format_percent(1250.0), "1,250.00%");
    }

    #[test]
    fn test_kpi_cards_order_and_values() {
        let totals = WriteoffTotals {
            writeoff_count: 1200,
            total_written_off: 200.0,
            total_repaid_for_writeoffs: 150.0,
            percent_repaid: 75.0,
        };
        let cards = kpi_cards(&totals);
        let values: Vec<&str> = cards.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["1,200", "200.00", "150.00", "75.00%"]);
        assert_eq!(cards[3].label, "% of repaid write-offs");
    }
}
