//! Currency minor-unit table
//!
//! Every place that rounds money asks this table how many decimal digits the
//! currency carries. Codes not listed use two digits.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{Error, Result};

/// Minor-unit digits used for codes the table does not know
pub const DEFAULT_MINOR_UNITS: u32 = 2;

/// ISO 4217 currencies whose minor unit is not two digits
const BUILTIN_MINOR_UNITS: &[(&str, u32)] = &[
    ("BIF", 0),
    ("CLP", 0),
    ("DJF", 0),
    ("GNF", 0),
    ("ISK", 0),
    ("JPY", 0),
    ("KMF", 0),
    ("KRW", 0),
    ("PYG", 0),
    ("RWF", 0),
    ("UGX", 0),
    ("VND", 0),
    ("VUV", 0),
    ("XAF", 0),
    ("XOF", 0),
    ("XPF", 0),
    ("BHD", 3),
    ("IQD", 3),
    ("JOD", 3),
    ("KWD", 3),
    ("LYD", 3),
    ("OMR", 3),
    ("TND", 3),
];

/// Currency code to minor-unit digit count
#[derive(Debug, Clone)]
pub struct CurrencyTable {
    minor_units: HashMap<String, u32>,
}

impl Default for CurrencyTable {
    fn default() -> Self {
        Self {
            minor_units: BUILTIN_MINOR_UNITS
                .iter()
                .map(|(code, digits)| (code.to_string(), *digits))
                .collect(),
        }
    }
}

impl CurrencyTable {
    /// Built-in table with overrides applied on top
    pub fn with_overrides(overrides: &[(String, u32)]) -> Self {
        let mut table = Self::default();
        for (code, digits) in overrides {
            table.minor_units.insert(code.to_uppercase(), *digits);
        }
        table
    }

    /// Parse overrides of the form `COP:0,XAU:4`
    pub fn parse_overrides(input: &str) -> Result<Vec<(String, u32)>> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|entry| {
                let (code, digits) = entry.split_once(':').ok_or_else(|| {
                    Error::Config(format!("currency precision entry '{}' is not CODE:DIGITS", entry))
                })?;
                let code = code.trim().to_uppercase();
                if !is_currency_code(&code) {
                    return Err(Error::Config(format!("'{}' is not a currency code", code)));
                }
                let digits: u32 = digits.trim().parse().map_err(|_| {
                    Error::Config(format!("'{}' is not a digit count for {}", digits, code))
                })?;
                if digits > 8 {
                    return Err(Error::Config(format!(
                        "{} minor units for {} is out of range",
                        digits, code
                    )));
                }
                Ok((code, digits))
            })
            .collect()
    }

    /// Minor-unit digits for a currency code (case-insensitive)
    pub fn minor_units(&self, currency: &str) -> u32 {
        self.minor_units
            .get(&currency.to_uppercase())
            .copied()
            .unwrap_or(DEFAULT_MINOR_UNITS)
    }

    /// Round half away from zero to the currency's precision
    pub fn round(&self, amount: Decimal, currency: &str) -> Decimal {
        amount.round_dp_with_strategy(
            self.minor_units(currency),
            RoundingStrategy::MidpointAwayFromZero,
        )
    }

    /// Round, then pad the scale so `7.5` renders as `7.50`
    pub fn normalize(&self, amount: Decimal, currency: &str) -> Decimal {
        let digits = self.minor_units(currency);
        let mut rounded = self.round(amount, currency);
        rounded.rescale(digits);
        rounded
    }
}

/// Three ASCII letters
pub fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

/// Map a bare currency symbol to a code. `$` is ambiguous and resolves to the fallback.
pub fn currency_from_symbol(symbol: &str, fallback: &str) -> Option<String> {
    let code = match symbol.trim() {
        "$" | "US$" => return Some(fallback.to_string()),
        "€" => "EUR",
        "£" => "GBP",
        "¥" | "￥" => "JPY",
        "₩" => "KRW",
        "₹" => "INR",
        "₽" => "RUB",
        "₺" => "TRY",
        "R$" => "BRL",
        _ => return None,
    };
    Some(code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_default_precision() {
        let table = CurrencyTable::default();
        assert_eq!(table.minor_units("USD"), 2);
        assert_eq!(table.minor_units("jpy"), 0);
        assert_eq!(table.minor_units("KWD"), 3);
    }

    #[test]
    fn test_round_half_away_from_zero() {
        let table = CurrencyTable::default();
        assert_eq!(table.round(dec("2.345"), "USD"), dec("2.35"));
        assert_eq!(table.round(dec("1250.5"), "JPY"), dec("1251"));
    }

    #[test]
    fn test_normalize_pads_scale() {
        let table = CurrencyTable::default();
        assert_eq!(table.normalize(dec("7.5"), "USD").to_string(), "7.50");
        assert_eq!(table.normalize(dec("100"), "KWD").to_string(), "100.000");
    }

    #[test]
    fn test_overrides() {
        let overrides = CurrencyTable::parse_overrides("cop:0, XAU:4").unwrap();
        let table = CurrencyTable::with_overrides(&overrides);
        assert_eq!(table.minor_units("COP"), 0);
        assert_eq!(table.minor_units("XAU"), 4);
        assert_eq!(table.minor_units("EUR"), 2);
    }

    #[test]
    fn test_bad_overrides_rejected() {
        assert!(CurrencyTable::parse_overrides("COP").is_err());
        assert!(CurrencyTable::parse_overrides("COPX:2").is_err());
        assert!(CurrencyTable::parse_overrides("COP:two").is_err());
    }

    #[test]
    fn test_symbols() {
        assert_eq!(currency_from_symbol("€", "USD").as_deref(), Some("EUR"));
        assert_eq!(currency_from_symbol("$", "COP").as_deref(), Some("COP"));
        assert_eq!(currency_from_symbol("?", "USD"), None);
    }
}
