//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Mony - Receipt extraction and transaction bookkeeping
#[derive(Parser)]
#[command(name = "mony")]
#[command(about = "Receipt extraction and transaction bookkeeping backend", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, env = "MONY_DB", default_value = "mony.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Allowed CORS origin (repeatable)
        #[arg(long = "cors-origin")]
        cors_origins: Vec<String>,
    },

    /// Extract a receipt image with the configured vision model
    Extract {
        /// Receipt image (jpeg, png or webp)
        image: PathBuf,

        /// Store the result as a transaction
        #[arg(long)]
        save: bool,

        /// Transaction type when saving: income, expense, transfer
        #[arg(short = 't', long = "type", default_value = "expense")]
        transaction_type: String,

        /// Print the raw JSON result
        #[arg(long)]
        json: bool,
    },

    /// List transactions
    Transactions {
        /// Maximum rows to show
        #[arg(short, long, default_value = "20")]
        limit: i64,

        /// Filter by type: income, expense, transfer
        #[arg(short = 't', long = "type")]
        transaction_type: Option<String>,

        /// Filter by category (exact, case-insensitive)
        #[arg(short, long)]
        category: Option<String>,

        /// Free-text search across merchant, description, category and reference
        #[arg(short, long)]
        search: Option<String>,

        /// Sort column: date, amount, merchant, category, created_at
        #[arg(long, default_value = "date")]
        sort_by: String,

        /// Sort direction: asc or desc
        #[arg(long, default_value = "desc")]
        sort_order: String,
    },

    /// Show income, expense and net for a month
    Summary {
        /// Year (defaults to the current year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Month 1-12 (defaults to the current month)
        #[arg(short, long)]
        month: Option<u32>,

        /// Only count transactions in this currency
        #[arg(short, long)]
        currency: Option<String>,
    },

    /// Show totals by type and net worth
    Stats {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Only count transactions in this currency
        #[arg(short, long)]
        currency: Option<String>,
    },
}
