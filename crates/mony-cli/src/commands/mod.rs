//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, load_config)
//! - `receipts` - Receipt extraction from a local image
//! - `reports` - Monthly summary and statistics
//! - `serve` - Web server command
//! - `transactions` - Transaction listing

pub mod core;
pub mod receipts;
pub mod reports;
pub mod serve;
pub mod transactions;

// Re-export command functions for main.rs
pub use core::*;
pub use receipts::*;
pub use reports::*;
pub use serve::*;
pub use transactions::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
