//! Domain models

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::currency::is_currency_code;
use crate::error::{Error, FieldError, Result};

/// Largest amount accepted for a single transaction
pub const MAX_TRANSACTION_AMOUNT: i64 = 1_000_000;

/// Kind of money movement. The direction of `amount` comes from this, never from its sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }

    pub fn all() -> &'static [TransactionType] {
        &[Self::Income, Self::Expense, Self::Transfer]
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for TransactionType {
    fn default() -> Self {
        Self::Expense
    }
}

/// One line on a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// Non-fatal normalization note attached to a successful extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub field: String,
    pub message: String,
}

impl Warning {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Structured result of reading a receipt image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptExtraction {
    /// Empty when the merchant could not be detected
    pub merchant: String,
    pub date: NaiveDate,
    pub total_amount: Decimal,
    pub currency: String,
    pub payment_method: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub receipt_number: Option<String>,
    pub taxes: Decimal,
    pub items: Vec<ReceiptItem>,
}

impl ReceiptExtraction {
    /// Convert into a transaction ready to be validated and persisted
    pub fn into_new_transaction(self, transaction_type: TransactionType) -> NewTransaction {
        NewTransaction {
            transaction_type,
            merchant: self.merchant,
            date: self.date,
            amount: self.total_amount,
            currency: self.currency,
            payment_method: self.payment_method,
            category: self.category,
            description: self.description,
            reference_number: self.receipt_number,
            taxes: if self.taxes.is_zero() {
                None
            } else {
                Some(self.taxes)
            },
            items: self.items,
        }
    }
}

/// A normalized extraction together with the notes produced while normalizing it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionOutcome {
    pub receipt: ReceiptExtraction,
    pub warnings: Vec<Warning>,
}

/// A persisted financial transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub merchant: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub reference_number: Option<String>,
    pub taxes: Option<Decimal>,
    pub items: Vec<ReceiptItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied transaction fields (create and full update)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    #[serde(rename = "type", alias = "transaction_type", default)]
    pub transaction_type: TransactionType,
    pub merchant: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    /// Empty means "use the configured fallback currency"
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub taxes: Option<Decimal>,
    #[serde(default)]
    pub items: Vec<ReceiptItem>,
}

impl NewTransaction {
    /// Trim text, uppercase the currency, then check every business rule.
    ///
    /// All offending fields are reported together.
    pub fn prepare(mut self, config: &Config) -> Result<Self> {
        self.merchant = self.merchant.trim().to_string();
        self.currency = self.currency.trim().to_uppercase();
        if self.currency.is_empty() {
            self.currency = config.fallback_currency.clone();
        }
        for field in [
            &mut self.payment_method,
            &mut self.category,
            &mut self.description,
            &mut self.reference_number,
        ] {
            *field = field
                .take()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
        }

        let mut errors = Vec::new();

        if self.merchant.is_empty() {
            errors.push(FieldError::new("merchant", "merchant name is required"));
        }

        let currency_ok = is_currency_code(&self.currency);
        if !currency_ok {
            errors.push(FieldError::new(
                "currency",
                format!("'{}' is not a 3-letter currency code", self.currency),
            ));
        }

        if self.amount <= Decimal::ZERO {
            errors.push(FieldError::new("amount", "amount must be greater than 0"));
        } else if self.amount > Decimal::from(MAX_TRANSACTION_AMOUNT) {
            errors.push(FieldError::new(
                "amount",
                format!("amount exceeds the {} limit", MAX_TRANSACTION_AMOUNT),
            ));
        } else if currency_ok {
            let digits = config.currencies.minor_units(&self.currency);
            if self.amount.normalize().scale() > digits {
                errors.push(FieldError::new(
                    "amount",
                    format!(
                        "{} allows at most {} decimal place(s)",
                        self.currency, digits
                    ),
                ));
            }
        }

        if let Some(taxes) = self.taxes {
            if taxes < Decimal::ZERO {
                errors.push(FieldError::new("taxes", "taxes cannot be negative"));
            }
        }

        for (i, item) in self.items.iter().enumerate() {
            if item.quantity <= Decimal::ZERO {
                errors.push(FieldError::new(
                    format!("items[{}].quantity", i),
                    "quantity must be greater than 0",
                ));
            }
            if item.unit_price < Decimal::ZERO {
                errors.push(FieldError::new(
                    format!("items[{}].unit_price", i),
                    "unit price cannot be negative",
                ));
            }
            if item.total_price < Decimal::ZERO {
                errors.push(FieldError::new(
                    format!("items[{}].total_price", i),
                    "total price cannot be negative",
                ));
            }
        }

        if errors.is_empty() {
            Ok(self)
        } else {
            Err(Error::Validation(errors))
        }
    }
}

/// One page of transactions plus the total matching the filters
#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}

/// Income/expense/net for one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub currency: Option<String>,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub total_transfer: Decimal,
    /// income - expense
    pub net: Decimal,
    pub transaction_count: i64,
    /// Expense totals per category; uncategorized expenses are grouped under "uncategorized"
    pub categories: BTreeMap<String, Decimal>,
}

/// Total and count for a single transaction type
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypeTotal {
    pub total: Decimal,
    pub count: i64,
}

/// Running totals by type plus net worth
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub currency: Option<String>,
    pub totals: BTreeMap<TransactionType, TypeTotal>,
    /// Cumulative income - cumulative expense since `since`, ignoring the date range
    pub net_worth: Decimal,
    /// Date of the earliest recorded transaction
    pub since: Option<NaiveDate>,
}
