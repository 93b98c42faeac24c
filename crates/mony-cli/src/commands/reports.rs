//! Report command implementations

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use mony_core::db::Database;

pub fn cmd_summary(
    db: &Database,
    year: Option<i32>,
    month: Option<u32>,
    currency: Option<&str>,
) -> Result<()> {
    let today = Utc::now().date_naive();
    let year = year.unwrap_or(today.year());
    let month = month.unwrap_or(today.month());

    let summary = db.monthly_summary(year, month, currency)?;

    println!();
    println!(
        "📊 Summary for {}-{:02}{}",
        year,
        month,
        summary
            .currency
            .as_deref()
            .map(|c| format!(" ({})", c))
            .unwrap_or_default()
    );
    println!("   ─────────────────────────────────");
    println!("   Income:    {:>14}", summary.total_income);
    println!("   Expense:   {:>14}", summary.total_expense);
    println!("   Transfers: {:>14}", summary.total_transfer);
    println!("   Net:       {:>14}", summary.net);
    println!("   Transactions: {}", summary.transaction_count);

    if !summary.categories.is_empty() {
        println!();
        println!("   Expenses by category:");
        for (category, total) in &summary.categories {
            println!("     {:<20} {:>12}", category, total);
        }
    }

    Ok(())
}

pub fn cmd_stats(
    db: &Database,
    from: Option<&str>,
    to: Option<&str>,
    currency: Option<&str>,
) -> Result<()> {
    let from = from.map(parse_date).transpose()?;
    let to = to.map(parse_date).transpose()?;

    let stats = db.statistics(from, to, currency)?;

    println!();
    println!("📈 Statistics");
    println!("   ─────────────────────────────────");
    for (transaction_type, total) in &stats.totals {
        println!(
            "   {:<10} {:>14}  ({} transactions)",
            transaction_type, total.total, total.count
        );
    }
    println!();
    println!("   Net worth: {}", stats.net_worth);
    if let Some(since) = stats.since {
        println!("   Since:     {}", since);
    }

    Ok(())
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}
