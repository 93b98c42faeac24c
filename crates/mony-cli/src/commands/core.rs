//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` - Runtime configuration from `MONY_*` variables
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use mony_core::{db::Database, Config};

/// Open (and migrate) the database
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

/// Build the runtime configuration once at start-up
pub fn load_config() -> Result<Config> {
    Config::from_env().context("Invalid MONY_* configuration")
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path)?;

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Read a receipt: mony extract receipt.jpg --save");
    println!("  2. Start the API: mony serve");

    Ok(())
}
