//! Transaction command implementations

use anyhow::Result;
use mony_core::db::{Database, ListParams};
use mony_core::models::TransactionType;

use super::truncate;

/// Options for `mony transactions`
#[derive(Debug, Clone)]
pub struct TransactionsQuery {
    pub limit: i64,
    pub transaction_type: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort_by: String,
    pub sort_order: String,
}

impl Default for TransactionsQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            transaction_type: None,
            category: None,
            search: None,
            sort_by: "date".to_string(),
            sort_order: "desc".to_string(),
        }
    }
}

pub fn cmd_transactions_list(db: &Database, query: &TransactionsQuery) -> Result<()> {
    let params = ListParams {
        transaction_type: query.transaction_type.clone(),
        category: query.category.clone(),
        search: query.search.clone(),
        sort_by: Some(query.sort_by.clone()),
        sort_order: Some(query.sort_order.clone()),
        limit: Some(query.limit.to_string()),
        ..Default::default()
    };
    let (filter, sort, page) = params.parse(mony_core::config::DEFAULT_MAX_PAGE_SIZE)?;
    let page = db.list_transactions(&filter, sort, page)?;

    if page.transactions.is_empty() {
        println!("No transactions found. Add one with:");
        println!("  mony extract receipt.jpg --save");
        return Ok(());
    }

    println!();
    println!(
        "📝 Transactions ({} of {})",
        page.transactions.len(),
        page.total
    );
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in page.transactions {
        let amount_str = match tx.transaction_type {
            TransactionType::Expense => format!("\x1b[31m-{} {}\x1b[0m", tx.amount, tx.currency), // Red
            TransactionType::Income => format!("\x1b[32m+{} {}\x1b[0m", tx.amount, tx.currency), // Green
            TransactionType::Transfer => format!("{} {}", tx.amount, tx.currency),
        };

        println!(
            "   #{:<5} {} │ {:>16} │ {} {}",
            tx.id,
            tx.date,
            amount_str,
            truncate(&tx.merchant, 32),
            tx.category
                .map(|c| format!("[{}]", c))
                .unwrap_or_default()
        );
    }

    Ok(())
}
