//! Receipt schema validation
//!
//! Turns decoded model output into a [`ReceiptExtraction`]. Fields are
//! defaulted independently; anything that had to be guessed or zeroed is
//! reported as a [`Warning`]. Only a non-object payload is rejected.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::currency::{currency_from_symbol, is_currency_code};
use crate::error::{Error, Result};
use crate::models::{ExtractionOutcome, ReceiptExtraction, ReceiptItem, Warning};

/// Outcome of reading one numeric field
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Missing,
    Invalid,
    Value(Decimal),
}

/// Validate decoded model output.
///
/// `received` is used when the receipt date cannot be determined.
pub fn validate_extraction(
    value: &Value,
    config: &Config,
    received: NaiveDate,
) -> Result<ExtractionOutcome> {
    let obj = match value {
        Value::Object(obj) => obj,
        Value::Array(_) => {
            return Err(Error::MalformedExtraction(
                "expected a JSON object, got an array".into(),
            ))
        }
        other => {
            return Err(Error::MalformedExtraction(format!(
                "expected a JSON object, got {}",
                json_type(other)
            )))
        }
    };

    let mut warnings = Vec::new();
    let table = &config.currencies;

    let currency = match text(obj, "currency") {
        Some(raw) => match normalize_currency(&raw, &config.fallback_currency) {
            Some(code) => code,
            None => {
                warnings.push(Warning::new(
                    "currency",
                    format!(
                        "unrecognized currency '{}', using {}",
                        raw, config.fallback_currency
                    ),
                ));
                config.fallback_currency.clone()
            }
        },
        None => {
            warnings.push(Warning::new(
                "currency",
                format!("currency not detected, using {}", config.fallback_currency),
            ));
            config.fallback_currency.clone()
        }
    };

    let merchant = text(obj, "merchant").unwrap_or_else(|| {
        warnings.push(Warning::new("merchant", "merchant not detected"));
        String::new()
    });

    let date = match text(obj, "date") {
        Some(raw) => parse_date(&raw).unwrap_or_else(|| {
            warnings.push(Warning::new(
                "date",
                format!("could not parse date '{}', using the upload date", raw),
            ));
            received
        }),
        None => {
            warnings.push(Warning::new(
                "date",
                "date not detected, using the upload date",
            ));
            received
        }
    };

    let total_amount = match money(obj, "total_amount", &mut warnings) {
        Number::Value(v) => v,
        Number::Missing => {
            warnings.push(Warning::new("total_amount", "total amount missing, using 0"));
            Decimal::ZERO
        }
        Number::Invalid => Decimal::ZERO,
    };

    let taxes = match money(obj, "taxes", &mut warnings) {
        Number::Value(v) => v,
        Number::Missing | Number::Invalid => Decimal::ZERO,
    };

    let items = match obj.get("items") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(entries)) => entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| item(i, entry, &currency, config, &mut warnings))
            .collect(),
        Some(other) => {
            warnings.push(Warning::new(
                "items",
                format!("expected a list, got {}; ignoring items", json_type(other)),
            ));
            Vec::new()
        }
    };

    let receipt = ReceiptExtraction {
        merchant,
        date,
        total_amount: table.normalize(total_amount, &currency),
        taxes: table.normalize(taxes, &currency),
        payment_method: text(obj, "payment_method"),
        category: text(obj, "category"),
        description: text(obj, "description"),
        receipt_number: text(obj, "receipt_number"),
        currency,
        items,
    };

    Ok(ExtractionOutcome { receipt, warnings })
}

fn item(
    index: usize,
    value: &Value,
    currency: &str,
    config: &Config,
    warnings: &mut Vec<Warning>,
) -> Option<ReceiptItem> {
    let field = |name: &str| format!("items[{}].{}", index, name);
    let table = &config.currencies;

    let Value::Object(obj) = value else {
        warnings.push(Warning::new(
            format!("items[{}]", index),
            format!("expected an object, got {}; skipped", json_type(value)),
        ));
        return None;
    };

    let name = text(obj, "name").unwrap_or_else(|| {
        warnings.push(Warning::new(field("name"), "item name missing"));
        String::new()
    });

    let quantity = match number(obj.get("quantity")) {
        Number::Missing => Decimal::ONE,
        Number::Value(q) if q > Decimal::ZERO => q.normalize(),
        Number::Value(_) | Number::Invalid => {
            warnings.push(Warning::new(
                field("quantity"),
                "quantity is not a positive number, using 1",
            ));
            Decimal::ONE
        }
    };

    let unit_price = item_money(obj, "unit_price", &field("unit_price"), warnings);
    let total_price = item_money(obj, "total_price", &field("total_price"), warnings);

    let (unit_price, total_price) = match (unit_price, total_price) {
        (Some(unit), Some(total)) => (unit, total),
        (Some(unit), None) => match quantity.checked_mul(unit) {
            Some(total) => (unit, table.round(total, currency)),
            None => {
                warnings.push(Warning::new(
                    field("total_price"),
                    "quantity times unit price is out of range, using 0",
                ));
                (unit, Decimal::ZERO)
            }
        },
        (None, Some(total)) => match total.checked_div(quantity) {
            Some(unit) => (table.round(unit, currency), total),
            None => {
                warnings.push(Warning::new(
                    field("unit_price"),
                    "total price divided by quantity is out of range, using 0",
                ));
                (Decimal::ZERO, total)
            }
        },
        (None, None) => {
            warnings.push(Warning::new(
                field("total_price"),
                "item has no price, using 0",
            ));
            (Decimal::ZERO, Decimal::ZERO)
        }
    };

    Some(ReceiptItem {
        name,
        quantity,
        unit_price: table.normalize(unit_price, currency),
        total_price: table.normalize(total_price, currency),
    })
}

/// Item price that is `None` when absent or unreadable, so it can be derived
fn item_money(
    obj: &Map<String, Value>,
    key: &str,
    field: &str,
    warnings: &mut Vec<Warning>,
) -> Option<Decimal> {
    match number(obj.get(key)) {
        Number::Missing => None,
        Number::Invalid => {
            warnings.push(Warning::new(field, "not a number"));
            None
        }
        Number::Value(v) if v < Decimal::ZERO => {
            warnings.push(Warning::new(field, "negative value, using its absolute value"));
            Some(v.abs())
        }
        Number::Value(v) => Some(v),
    }
}

/// Top-level money field: unreadable values become 0, negatives are flipped
fn money(obj: &Map<String, Value>, key: &str, warnings: &mut Vec<Warning>) -> Number {
    match number(obj.get(key)) {
        Number::Invalid => {
            warnings.push(Warning::new(key, "not a number, using 0"));
            Number::Invalid
        }
        Number::Value(v) if v < Decimal::ZERO => {
            warnings.push(Warning::new(key, "negative value, using its absolute value"));
            Number::Value(v.abs())
        }
        other => other,
    }
}

fn number(value: Option<&Value>) -> Number {
    match value {
        None | Some(Value::Null) => Number::Missing,
        Some(Value::Number(n)) => {
            let s = n.to_string();
            s.parse::<Decimal>()
                .or_else(|_| Decimal::from_scientific(&s))
                .map(Number::Value)
                .unwrap_or(Number::Invalid)
        }
        Some(Value::String(s)) if s.trim().is_empty() => Number::Missing,
        Some(Value::String(s)) => parse_locale_number(s)
            .map(Number::Value)
            .unwrap_or(Number::Invalid),
        Some(_) => Number::Invalid,
    }
}

/// Parse numbers written in either `1,234.56` or `1.234,56` style.
///
/// A currency symbol or code may lead or trail the number, and a sign may be
/// written as `-3`, `3-` or `(3)`. Anything else (letters, exponents, spaces
/// inside the digits) makes the input unreadable. A lone comma followed by
/// exactly three digits is read as a thousands separator.
pub fn parse_locale_number(input: &str) -> Option<Decimal> {
    let mut trimmed = input.trim();
    let mut negative = false;
    if let Some(inner) = trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        negative = true;
        trimmed = inner.trim();
    }

    let first = trimmed.find(|c: char| c.is_ascii_digit())?;
    let last = trimmed.rfind(|c: char| c.is_ascii_digit())?;
    // ".5" and ",5" keep their leading separator
    let start = match trimmed[..first].chars().next_back() {
        Some(c @ ('.' | ',')) => first - c.len_utf8(),
        _ => first,
    };

    let cleaned = &trimmed[start..=last];
    if !cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || c == ',' || c == '.')
    {
        return None;
    }

    for marker in [&trimmed[..start], &trimmed[last + 1..]] {
        let marker = marker.trim();
        let signless = marker.trim_matches(|c: char| c == '-' || c == '+' || c.is_whitespace());
        if marker.contains('-') {
            negative = true;
        }
        if !is_currency_marker(signless) {
            return None;
        }
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');

    let canonical = match (last_comma, last_dot) {
        (Some(c), Some(d)) => {
            if c > d {
                cleaned.replace('.', "").replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (Some(c), None) => {
            let decimals = cleaned.len() - c - 1;
            if cleaned.matches(',').count() == 1 && decimals != 3 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned.to_string(),
    };

    let value: Decimal = canonical.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Empty, a known currency symbol, or a three-letter code
fn is_currency_marker(marker: &str) -> bool {
    marker.is_empty() || is_currency_code(marker) || currency_from_symbol(marker, "USD").is_some()
}

fn normalize_currency(raw: &str, fallback: &str) -> Option<String> {
    let trimmed = raw.trim();
    if is_currency_code(trimmed) {
        return Some(trimmed.to_uppercase());
    }
    currency_from_symbol(trimmed, fallback)
}

/// Trimmed, non-empty text. Numbers are accepted and rendered as text.
fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%m-%d-%Y", "%d-%m-%Y", "%d.%m.%Y",
    "%d/%m/%y", "%d.%m.%y",
];

const MONTHS: &[(&str, u32)] = &[
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("sept", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("setiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
    ("ene", 1),
    ("abr", 4),
    ("ago", 8),
    ("dic", 12),
];

/// Parse a receipt date in any of the common numeric layouts or with a month name
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();

    // Timestamps: keep only the date part
    let candidate = match input.split_once(['T', ' ']) {
        Some((head, _)) if head.len() == 10 && head.as_bytes()[4] == b'-' => head,
        _ => input,
    };

    DATE_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
        .find(plausible)
        .or_else(|| parse_month_name_date(input))
}

fn plausible(date: &NaiveDate) -> bool {
    (1900..=2100).contains(&date.year())
}

fn month_from_word(word: &str) -> Option<u32> {
    let word = word.trim_end_matches('.');
    if let Some((_, m)) = MONTHS.iter().find(|(name, _)| *name == word) {
        return Some(*m);
    }
    if word.len() >= 3 {
        return MONTHS
            .iter()
            .find(|(name, _)| name.len() > 4 && name.starts_with(word))
            .map(|(_, m)| *m);
    }
    None
}

/// "March 15, 2024", "15 Mar 2024", "15 de marzo de 2024"
fn parse_month_name_date(input: &str) -> Option<NaiveDate> {
    let lower = input.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let month = tokens.iter().find_map(|t| month_from_word(t))?;
    let numbers: Vec<u32> = tokens.iter().filter_map(|t| t.parse().ok()).collect();
    let year = numbers.iter().copied().find(|n| (1900..=2100).contains(n))?;
    let day = numbers.iter().copied().find(|n| (1..=31).contains(n))?;

    NaiveDate::from_ymd_opt(year as i32, month, day)
}
