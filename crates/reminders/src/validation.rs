//! Per-row validation for single-invoice creation and bulk import.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::date::is_valid_date;
use crate::money::parse_amount;

/// Column names every row must carry (looked up case-insensitively).
pub const REQUIRED_FIELDS: [&str; 5] = ["Invoice", "Client", "Email", "Amount", "Due"];

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"));

/// One raw record from an upload: column name to cell text.
///
/// Extra columns are carried along but ignored by validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRow(BTreeMap<String, String>);

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw cell for `key`, exact match first, then case-insensitive.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .or_else(|| {
                self.0
                    .iter()
                    .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }

    /// Trimmed cell for `key`; blank cells count as absent.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Validate one row. `index` is 0-based; messages use the 1-based row number.
///
/// Every check runs; an empty list means the row is accepted. A blank cell is
/// reported as missing and not format-checked.
pub fn validate_row(row: &RawRow, index: usize) -> Vec<String> {
    let n = index + 1;
    let mut errors = Vec::new();

    for field in REQUIRED_FIELDS {
        if row.value(field).is_none() {
            errors.push(format!("Row {n}: Missing {field}"));
        }
    }

    if let Some(email) = row.value("Email") {
        if !is_valid_email(email) {
            errors.push(format!("Row {n}: Invalid email format"));
        }
    }

    if let Some(amount) = row.value("Amount") {
        if parse_amount(amount).is_none() {
            errors.push(format!("Row {n}: Invalid amount"));
        }
    }

    if let Some(due) = row.value("Due") {
        if !is_valid_date(due) {
            errors.push(format!("Row {n}: Invalid date format"));
        }
    }

    errors
}

/// Simple `local@domain.tld` check.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn valid_row() -> RawRow {
        RawRow::new()
            .with("Invoice", "INV-001")
            .with("Client", "Acme Ltd")
            .with("Email", "billing@acme.test")
            .with("Amount", "1200.00")
            .with("Due", "15/03/2025")
    }

    #[test]
    fn well_formed_row_has_no_errors() {
        assert!(validate_row(&valid_row(), 0).is_empty());
    }

    #[test]
    fn keys_are_case_insensitive_and_extra_columns_ignored() {
        let row = RawRow::new()
            .with("invoice", "INV-9")
            .with("CLIENT", "Globex")
            .with("email", "ap@globex.test")
            .with("amount", "10")
            .with("due", "2025-01-31")
            .with("Notes", "net 30");
        assert!(validate_row(&row, 4).is_empty());
    }

    #[test]
    fn all_checks_accumulate() {
        let row = RawRow::new()
            .with("Invoice", "INV-2")
            .with("Email", "not-an-email")
            .with("Amount", "-4")
            .with("Due", "someday");
        assert_eq!(
            validate_row(&row, 1),
            vec![
                "Row 2: Missing Client".to_string(),
                "Row 2: Invalid email format".to_string(),
                "Row 2: Invalid amount".to_string(),
                "Row 2: Invalid date format".to_string(),
            ]
        );
    }

    #[test]
    fn far_future_and_far_past_years_are_invalid_dates() {
        for due in ["Dec 31, +262142", "Jan 02, -262143"] {
            assert_eq!(
                validate_row(&valid_row().with("Due", due), 0),
                vec!["Row 1: Invalid date format".to_string()]
            );
        }
    }

    #[test]
    fn blank_cells_are_missing_not_malformed() {
        let row = valid_row().with("Email", "   ").with("Amount", "");
        assert_eq!(
            validate_row(&row, 0),
            vec!["Row 1: Missing Email".to_string(), "Row 1: Missing Amount".to_string()]
        );
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
        assert!(!is_valid_email("@c.de"));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: dropping any subset of required columns yields exactly one
        /// `Missing <Field>` entry per dropped column.
        #[test]
        fn one_missing_entry_per_missing_field(mask in 0u8..32, index in 0usize..500) {
            let mut row = RawRow::new();
            let full = valid_row();
            let mut dropped = Vec::new();
            for (bit, field) in REQUIRED_FIELDS.iter().enumerate() {
                if mask & (1 << bit) == 0 {
                    row.insert(*field, full.get(field).unwrap());
                } else {
                    dropped.push(*field);
                }
            }

            let errors = validate_row(&row, index);
            for field in REQUIRED_FIELDS {
                let needle = format!("Row {}: Missing {}", index + 1, field);
                let count = errors.iter().filter(|e| **e == needle).count();
                prop_assert_eq!(count, usize::from(dropped.contains(&field)));
            }
            prop_assert_eq!(errors.len(), dropped.len());
        }
    }
}
