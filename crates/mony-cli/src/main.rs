//! Mony CLI - Receipt extraction and transaction bookkeeping
//!
//! Usage:
//!   mony init                     Initialize database
//!   mony extract receipt.jpg      Read a receipt with the vision model
//!   mony transactions --limit 50  List transactions
//!   mony serve --port 3000        Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use mony_core::ai::AIClient;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Serve {
            port,
            host,
            cors_origins,
        } => commands::cmd_serve(&cli.db, &host, port, cors_origins).await,
        Commands::Extract {
            image,
            save,
            transaction_type,
            json,
        } => {
            commands::cmd_extract(
                &cli.db,
                &image,
                save.then_some(transaction_type.as_str()),
                json,
                AIClient::from_env(),
            )
            .await
        }
        Commands::Transactions {
            limit,
            transaction_type,
            category,
            search,
            sort_by,
            sort_order,
        } => {
            let db = commands::open_db(&cli.db)?;
            let query = commands::TransactionsQuery {
                limit,
                transaction_type,
                category,
                search,
                sort_by,
                sort_order,
            };
            commands::cmd_transactions_list(&db, &query)
        }
        Commands::Summary {
            year,
            month,
            currency,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_summary(&db, year, month, currency.as_deref())
        }
        Commands::Stats { from, to, currency } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_stats(&db, from.as_deref(), to.as_deref(), currency.as_deref())
        }
    }
}
