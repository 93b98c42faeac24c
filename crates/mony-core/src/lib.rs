//! Mony Core Library
//!
//! Shared functionality for the Mony receipt and transaction backend:
//! - Transaction model and business rules
//! - Currency precision table
//! - Pluggable vision model backends (Ollama, OpenAI-compatible, mock)
//! - Model output recovery and receipt schema validation
//! - Receipt pipeline (upload checks, extraction, promotion)
//! - Database access, filtering, sorting and aggregation

pub mod ai;
pub mod config;
pub mod currency;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod validate;

/// Test utilities including mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIBackend, AIClient, MockBackend, MockReply, OllamaBackend, OpenAICompatibleBackend,
    ReceiptExtractor,
};
pub use config::{Config, ExtractionConfig};
pub use currency::CurrencyTable;
pub use db::{Database, ListParams, Page, Sort, SortField, SortOrder, TransactionFilter};
pub use error::{Error, FieldError, Result};
pub use models::{
    ExtractionOutcome, MonthlySummary, NewTransaction, ReceiptExtraction, ReceiptItem,
    Statistics, Transaction, TransactionPage, TransactionType, TypeTotal, Warning,
};
pub use pipeline::{ReceiptPipeline, ReceiptSubmission, Stage};
pub use prompts::{Prompt, PromptId};
