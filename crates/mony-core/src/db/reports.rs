//! Monthly summaries and running statistics
//!
//! Amounts are summed as `Decimal` in Rust rather than with SQL `SUM`, which
//! would coerce the decimal text columns to floating point.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::transaction_filter::TransactionFilter;
use super::transactions::parse_decimal;
use super::Database;
use crate::error::{Error, Result};
use crate::models::{MonthlySummary, Statistics, TransactionType, TypeTotal};

/// Category key for expenses recorded without one
pub const UNCATEGORIZED: &str = "uncategorized";

/// The columns aggregation needs from each matching row
struct AmountRow {
    transaction_type: TransactionType,
    amount: Decimal,
    category: Option<String>,
}

impl Database {
    /// Income, expense, transfer and net for one calendar month, plus expense per category
    pub fn monthly_summary(
        &self,
        year: i32,
        month: u32,
        currency: Option<&str>,
    ) -> Result<MonthlySummary> {
        let (first, last) = month_bounds(year, month)?;
        let filter = TransactionFilter::new()
            .currency(currency)
            .date_range(Some(first), Some(last));

        let mut summary = MonthlySummary {
            year,
            month,
            currency: filter.currency.clone(),
            total_income: Decimal::ZERO,
            total_expense: Decimal::ZERO,
            total_transfer: Decimal::ZERO,
            net: Decimal::ZERO,
            transaction_count: 0,
            categories: BTreeMap::new(),
        };

        for row in self.amount_rows(&filter)? {
            summary.transaction_count += 1;
            match row.transaction_type {
                TransactionType::Income => summary.total_income += row.amount,
                TransactionType::Transfer => summary.total_transfer += row.amount,
                TransactionType::Expense => {
                    summary.total_expense += row.amount;
                    let key = row.category.unwrap_or_else(|| UNCATEGORIZED.to_string());
                    *summary.categories.entry(key).or_insert(Decimal::ZERO) += row.amount;
                }
            }
        }
        summary.net = summary.total_income - summary.total_expense;

        Ok(summary)
    }

    /// Totals by type over an optional date range, plus all-time net worth
    pub fn statistics(
        &self,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
        currency: Option<&str>,
    ) -> Result<Statistics> {
        let all_time = TransactionFilter::new().currency(currency);
        let ranged = all_time.clone().date_range(date_from, date_to);
        ranged.validate()?;

        let mut totals: BTreeMap<TransactionType, TypeTotal> = TransactionType::all()
            .iter()
            .map(|t| (*t, TypeTotal::default()))
            .collect();
        for row in self.amount_rows(&ranged)? {
            let entry = totals.entry(row.transaction_type).or_default();
            entry.total += row.amount;
            entry.count += 1;
        }

        let mut net_worth = Decimal::ZERO;
        for row in self.amount_rows(&all_time)? {
            match row.transaction_type {
                TransactionType::Income => net_worth += row.amount,
                TransactionType::Expense => net_worth -= row.amount,
                TransactionType::Transfer => {}
            }
        }

        Ok(Statistics {
            date_from,
            date_to,
            currency: all_time.currency.clone(),
            totals,
            net_worth,
            since: self.earliest_date(&all_time)?,
        })
    }

    fn amount_rows(&self, filter: &TransactionFilter) -> Result<Vec<AmountRow>> {
        let conn = self.conn()?;
        let built = filter.build();
        let sql = format!(
            "SELECT t.transaction_type, t.amount, t.category FROM transactions t {}",
            built.where_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(built.params_refs().as_slice(), |row| {
                let type_str: String = row.get(0)?;
                let amount_str: String = row.get(1)?;
                Ok((type_str, parse_decimal(1, &amount_str)?, row.get(2)?))
            })?
            .collect::<std::result::Result<Vec<(String, Decimal, Option<String>)>, _>>()?;

        rows.into_iter()
            .map(|(type_str, amount, category)| {
                Ok(AmountRow {
                    transaction_type: type_str.parse().map_err(Error::InvalidData)?,
                    amount,
                    category,
                })
            })
            .collect()
    }

    fn earliest_date(&self, filter: &TransactionFilter) -> Result<Option<NaiveDate>> {
        let conn = self.conn()?;
        let built = filter.build();
        let sql = format!(
            "SELECT MIN(t.date) FROM transactions t {}",
            built.where_clause
        );

        let min: Option<String> =
            conn.query_row(&sql, built.params_refs().as_slice(), |row| row.get(0))?;

        min.map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .map_err(|_| Error::InvalidData(format!("bad stored date '{}'", s)))
        })
        .transpose()
    }
}

/// First and last day of a calendar month
fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    if !(1..=12).contains(&month) {
        return Err(Error::InvalidFilter(format!(
            "month must be between 1 and 12, got {}",
            month
        )));
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::InvalidFilter(format!("year {} is out of range", year)))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| Error::InvalidFilter(format!("year {} is out of range", year)))?;
    Ok((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_bounds() {
        let (first, last) = month_bounds(2024, 2).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let (_, last) = month_bounds(2023, 12).unwrap();
        assert_eq!(last, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());

        assert!(matches!(month_bounds(2024, 13), Err(Error::InvalidFilter(_))));
        assert!(month_bounds(2024, 0).is_err());
    }
}
