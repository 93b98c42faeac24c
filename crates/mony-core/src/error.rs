//! Error types for Mony

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// A single offending field in a validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Model provider answered with a non-success status
    #[error("Model provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Payload too large: {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Receipt extraction timed out after {0:?}")]
    ExtractionTimeout(Duration),

    #[error("Receipt extraction unavailable: {0}")]
    ExtractionUnavailable(String),

    /// Model output could not be recovered to JSON. `raw` is kept for logs only.
    #[error("Could not parse model output: {message}")]
    ExtractionParse { message: String, raw: String },

    #[error("Malformed extraction: {0}")]
    MalformedExtraction(String),

    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Invalid sort: {0}")]
    InvalidSort(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Stable, machine-readable error kind used in API error payloads
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedMediaType(_) => "UnsupportedMediaType",
            Self::PayloadTooLarge { .. } => "PayloadTooLarge",
            Self::ExtractionTimeout(_) => "ExtractionTimeout",
            Self::ExtractionUnavailable(_) | Self::Provider { .. } => "ExtractionUnavailable",
            Self::ExtractionParse { .. } => "ExtractionParseError",
            Self::MalformedExtraction(_) => "MalformedExtraction",
            Self::Validation(_) => "ValidationFailure",
            Self::InvalidSort(_) => "InvalidSort",
            Self::InvalidFilter(_) => "InvalidFilter",
            Self::NotFound(_) => "NotFound",
            Self::Database(_) | Self::Pool(_) => "StoreFailure",
            Self::Io(_)
            | Self::Http(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::InvalidData(_) => "InternalError",
        }
    }

    /// Shorthand for a validation failure on a single field
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }
}

pub type Result<T> = std::result::Result<T, Error>;
