//! Transaction operations

use rusqlite::{params, OptionalExtension};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::transaction_filter::{Page, Sort, TransactionFilter};
use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{NewTransaction, ReceiptItem, Transaction, TransactionPage};

/// Largest page the search endpoint returns
pub const MAX_SEARCH_LIMIT: i64 = 50;

/// Shortest accepted search term (in characters)
const MIN_SEARCH_CHARS: usize = 2;

const TRANSACTION_COLUMNS: &str = "t.id, t.transaction_type, t.merchant, t.date, t.amount, \
     t.currency, t.payment_method, t.category, t.description, t.reference_number, t.taxes, \
     t.items, t.created_at, t.updated_at";

impl Database {
    /// Insert an already-validated transaction and return the stored row
    pub fn insert_transaction(&self, tx: &NewTransaction) -> Result<Transaction> {
        let id = {
            let conn = self.conn()?;
            conn.execute(
                r#"
                INSERT INTO transactions (transaction_type, merchant, date, amount, currency,
                    payment_method, category, description, reference_number, taxes, items)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    tx.transaction_type.as_str(),
                    tx.merchant,
                    tx.date.to_string(),
                    tx.amount.to_string(),
                    tx.currency,
                    tx.payment_method,
                    tx.category,
                    tx.description,
                    tx.reference_number,
                    tx.taxes.map(|t| t.to_string()),
                    serde_json::to_string(&tx.items)?,
                ],
            )?;
            conn.last_insert_rowid()
        };

        info!(transaction_id = id, merchant = %tx.merchant, amount = %tx.amount, "Transaction stored");

        self.get_transaction(id)?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", id)))
    }

    /// Get a single transaction by ID
    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions t WHERE t.id = ?",
            TRANSACTION_COLUMNS
        );

        let transaction = conn
            .query_row(&sql, params![id], Self::row_to_transaction)
            .optional()?;

        Ok(transaction)
    }

    /// Replace every caller-editable field. Returns `None` when the id does not exist.
    pub fn update_transaction(&self, id: i64, tx: &NewTransaction) -> Result<Option<Transaction>> {
        let changed = {
            let conn = self.conn()?;
            conn.execute(
                r#"
                UPDATE transactions SET
                    transaction_type = ?, merchant = ?, date = ?, amount = ?, currency = ?,
                    payment_method = ?, category = ?, description = ?, reference_number = ?,
                    taxes = ?, items = ?, updated_at = CURRENT_TIMESTAMP
                WHERE id = ?
                "#,
                params![
                    tx.transaction_type.as_str(),
                    tx.merchant,
                    tx.date.to_string(),
                    tx.amount.to_string(),
                    tx.currency,
                    tx.payment_method,
                    tx.category,
                    tx.description,
                    tx.reference_number,
                    tx.taxes.map(|t| t.to_string()),
                    serde_json::to_string(&tx.items)?,
                    id,
                ],
            )?
        };

        if changed == 0 {
            return Ok(None);
        }
        info!(transaction_id = id, "Transaction updated");
        self.get_transaction(id)
    }

    /// Delete a transaction. Returns whether a row was removed.
    pub fn delete_transaction(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM transactions WHERE id = ?", params![id])?;
        if deleted > 0 {
            info!(transaction_id = id, "Transaction deleted");
        }
        Ok(deleted > 0)
    }

    /// One page of transactions plus the total matching the same filters
    pub fn list_transactions(
        &self,
        filter: &TransactionFilter,
        sort: Sort,
        page: Page,
    ) -> Result<TransactionPage> {
        filter.validate()?;
        let total = self.count_transactions(filter)?;

        let built = filter.build();
        let sql = format!(
            "SELECT {} FROM transactions t {} {} LIMIT ? OFFSET ?",
            TRANSACTION_COLUMNS,
            built.where_clause,
            sort.order_clause()
        );
        debug!(sql = %sql, "Listing transactions");

        let mut params = built.into_params();
        params.push(Box::new(page.limit));
        params.push(Box::new(page.offset));
        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(params_refs.as_slice(), Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(TransactionPage {
            transactions,
            total,
            offset: page.offset,
            limit: page.limit,
        })
    }

    /// Count transactions matching a filter
    pub fn count_transactions(&self, filter: &TransactionFilter) -> Result<i64> {
        let conn = self.conn()?;
        let built = filter.build();

        let sql = built.build_count_query();
        let mut stmt = conn.prepare(&sql)?;
        let params_refs = built.params_refs();

        let count: i64 = stmt.query_row(params_refs.as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    /// Free-text search across merchant, description, category and reference number,
    /// newest first
    pub fn search_transactions(&self, query: &str, limit: Option<i64>) -> Result<Vec<Transaction>> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_CHARS {
            return Err(Error::InvalidFilter(format!(
                "search term must be at least {} characters",
                MIN_SEARCH_CHARS
            )));
        }
        let limit = limit.unwrap_or(super::DEFAULT_PAGE_SIZE);
        if !(1..=MAX_SEARCH_LIMIT).contains(&limit) {
            return Err(Error::InvalidFilter(format!(
                "limit must be between 1 and {}",
                MAX_SEARCH_LIMIT
            )));
        }

        let filter = TransactionFilter::new().search(Some(query));
        let page = self.list_transactions(&filter, Sort::default(), Page { offset: 0, limit })?;
        Ok(page.transactions)
    }

    /// Map a row selected with `TRANSACTION_COLUMNS`
    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let type_str: String = row.get(1)?;
        let date_str: String = row.get(3)?;
        let taxes_str: Option<String> = row.get(10)?;
        let items_str: String = row.get(11)?;
        let created_at_str: String = row.get(12)?;
        let updated_at_str: String = row.get(13)?;

        Ok(Transaction {
            id: row.get(0)?,
            transaction_type: type_str
                .parse()
                .map_err(|e: String| conversion_error(1, Error::InvalidData(e)))?,
            merchant: row.get(2)?,
            date: chrono::NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                .map_err(|e| conversion_error(3, e))?,
            amount: parse_decimal(4, &row.get::<_, String>(4)?)?,
            currency: row.get(5)?,
            payment_method: row.get(6)?,
            category: row.get(7)?,
            description: row.get(8)?,
            reference_number: row.get(9)?,
            taxes: taxes_str.map(|s| parse_decimal(10, &s)).transpose()?,
            items: serde_json::from_str::<Vec<ReceiptItem>>(&items_str)
                .map_err(|e| conversion_error(11, e))?,
            created_at: parse_datetime(&created_at_str),
            updated_at: parse_datetime(&updated_at_str),
        })
    }
}

/// Parse a decimal TEXT column
pub(crate) fn parse_decimal(idx: usize, s: &str) -> rusqlite::Result<Decimal> {
    s.parse::<Decimal>().map_err(|e| conversion_error(idx, e))
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}
