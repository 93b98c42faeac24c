//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod health;
pub mod receipts;
pub mod reports;
pub mod transactions;

// Re-export all handlers for use in router
pub use health::*;
pub use receipts::*;
pub use reports::*;
pub use transactions::*;
