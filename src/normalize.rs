// 🔑 Key Normalizer - phone numbers → last 9 digits
//
// Formatting, country codes and leading zeros differ between the repayment
// and write-off ledgers, so the join key is the trailing 9 digits of whatever
// was typed. Fewer than 9 digits are kept as-is, including the empty string.
//
// All values that carry no digits land in the "" bucket on BOTH sides of the
// join. That collision is intentional: unknown numbers are treated as noise.

use serde::Serialize;
use std::fmt;

/// Number of trailing digits kept in a normalized key.
pub const KEY_DIGITS: usize = 9;

// ============================================================================
// FIELD VALUE (explicit nullable cell)
// ============================================================================

/// A single cell read from an external table.
///
/// Loaders decide what counts as "no data" (empty CSV cell, empty or error
/// spreadsheet cell) and map it to `Missing`; everything downstream works
/// with total functions over this type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Missing,
    Text(String),
    Integer(i64),
    Number(f64),
}

impl FieldValue {
    /// Build a text cell, treating the empty string as missing.
    pub fn from_text(raw: &str) -> Self {
        if raw.is_empty() {
            FieldValue::Missing
        } else {
            FieldValue::Text(raw.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    /// Rendering used for CSV export and display.
    ///
    /// Integral floats keep one decimal place (`150.0`) so a float column
    /// stays recognisable as such in the export.
    pub fn to_csv_string(&self) -> String {
        match self {
            FieldValue::Missing => String::new(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Number(n) if n.is_nan() => String::new(),
            FieldValue::Number(n) if n.is_finite() && n.fract() == 0.0 => format!("{:.1}", n),
            FieldValue::Number(n) => n.to_string(),
        }
    }

    /// Textual form as a human would have typed it. `None` for missing values.
    fn as_typed_text(&self) -> Option<String> {
        match self {
            FieldValue::Missing => None,
            FieldValue::Number(n) if n.is_nan() => None,
            FieldValue::Text(s) => Some(expand_exponent(s).unwrap_or_else(|| s.clone())),
            FieldValue::Integer(i) => Some(i.to_string()),
            // f64 Display never switches to exponent notation.
            FieldValue::Number(n) => Some(n.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_csv_string())
    }
}

impl From<&str> for FieldValue {
    fn from(raw: &str) -> Self {
        FieldValue::from_text(raw)
    }
}

// ============================================================================
// PHONE KEY
// ============================================================================

/// Normalized join key: 0 to 9 ASCII digits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PhoneKey(String);

impl PhoneKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the shared "no digits" bucket.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PhoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PhoneKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Normalize any cell into its join key. Never fails.
///
/// ```
/// use writeoff_recon::{normalize_key, FieldValue};
///
/// assert_eq!(normalize_key(&FieldValue::from("+1 555 123 4567")).as_str(), "551234567");
/// assert_eq!(normalize_key(&FieldValue::Missing).as_str(), "");
/// ```
pub fn normalize_key(value: &FieldValue) -> PhoneKey {
    match value.as_typed_text() {
        Some(text) => PhoneKey(last_digits(&text, KEY_DIGITS)),
        None => PhoneKey::default(),
    }
}

/// Convenience wrapper for raw text input.
pub fn normalize_text(raw: &str) -> PhoneKey {
    normalize_key(&FieldValue::from_text(raw))
}

/// Strip every non-digit and keep the trailing `n` digits.
fn last_digits(text: &str, n: usize) -> String {
    let digits: Vec<char> = text.chars().filter(|c| c.is_ascii_digit()).collect();
    let start = digits.len().saturating_sub(n);
    digits[start..].iter().collect()
}

/// Spreadsheet exports often write long numbers as `2.55712345678E+11`.
/// Stripping non-digits from that would splice mantissa and exponent
/// together, so such text is re-rendered as a plain number first.
fn expand_exponent(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if !trimmed.contains(['e', 'E']) {
        return None;
    }
    let value: f64 = trimmed.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let plain = value.to_string();
    log::warn!("phone value '{}' is in exponent notation; read as {}", trimmed, plain);
    Some(plain)
}

// ============================================================================
// AMOUNT COERCION
// ============================================================================

/// Coerce a monetary cell to f64. Anything unparseable counts as 0.0.
///
/// Only plain decimal text is accepted; thousands separators and currency
/// symbols make the value unparseable.
pub fn coerce_amount(value: &FieldValue) -> f64 {
    let parsed = match value {
        FieldValue::Missing => None,
        FieldValue::Integer(i) => Some(*i as f64),
        FieldValue::Number(n) => Some(*n),
        FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
    };

    match parsed {
        Some(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

// ============================================================================
// TESTS
// ============================================================================
