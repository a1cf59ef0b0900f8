//! Amounts and currency codes.

use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use dunning_core::DomainError;

/// ISO-4217-like currency code: three ASCII letters, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display symbol; unknown codes render as the code itself.
    pub fn symbol(&self) -> &str {
        match self.0.as_str() {
            "USD" => "$",
            "INR" => "₹",
            "EUR" => "€",
            "GBP" => "£",
            "JPY" | "CNY" => "¥",
            "AUD" => "A$",
            "CAD" => "C$",
            "SEK" | "NOK" => "kr",
            "NZD" => "NZ$",
            "SGD" => "S$",
            "HKD" => "HK$",
            "KRW" => "₩",
            "TRY" => "₺",
            "RUB" => "₽",
            "BRL" => "R$",
            "ZAR" => "R",
            "MXN" => "Mex$",
            other => other,
        }
    }

    /// `amount` prefixed with the currency symbol, two decimal places.
    pub fn format(&self, amount: Decimal) -> String {
        let mut rounded = amount.round_dp(2);
        rounded.rescale(2);
        format!("{}{}", self.symbol(), rounded)
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::usd()
    }
}

impl core::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(DomainError::validation(vec![format!(
                "Invalid currency code: {code}"
            )]));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

/// Parse an invoice amount. Only finite, strictly positive numbers qualify.
pub fn parse_amount(input: &str) -> Option<Decimal> {
    let text = input.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
        .filter(|amount| amount.is_sign_positive() && !amount.is_zero())
}
