//! Runtime configuration
//!
//! Built once at start-up and handed to every component that needs it.

use std::path::PathBuf;
use std::time::Duration;

use crate::currency::{is_currency_code, CurrencyTable};
use crate::error::{Error, Result};

/// Maximum receipt upload size (10 MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Maximum page size for transaction listings
pub const DEFAULT_MAX_PAGE_SIZE: i64 = 100;

/// Image types accepted for receipt uploads
pub const DEFAULT_ACCEPTED_MEDIA_TYPES: &[&str] =
    &["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// Settings for the model call
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Deadline for a single model call
    pub timeout: Duration,
    /// Total attempts on transient transport failures (timeouts are never retried)
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub retry_delay: Duration,
    /// Optional directory containing an `extract_receipt.md` prompt override
    pub prompts_dir: Option<PathBuf>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(45),
            max_attempts: 2,
            retry_delay: Duration::from_millis(500),
            prompts_dir: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Currency used when the receipt does not reveal one
    pub fallback_currency: String,
    pub max_upload_bytes: usize,
    /// Lowercase MIME types accepted for receipt uploads
    pub accepted_media_types: Vec<String>,
    pub extraction: ExtractionConfig,
    pub max_page_size: i64,
    pub currencies: CurrencyTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fallback_currency: "USD".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            accepted_media_types: DEFAULT_ACCEPTED_MEDIA_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            extraction: ExtractionConfig::default(),
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            currencies: CurrencyTable::default(),
        }
    }
}

impl Config {
    /// Build from `MONY_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, test map, ...)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(currency) = get("MONY_DEFAULT_CURRENCY") {
            let currency = currency.trim().to_uppercase();
            if !is_currency_code(&currency) {
                return Err(Error::Config(format!(
                    "MONY_DEFAULT_CURRENCY '{}' is not a 3-letter currency code",
                    currency
                )));
            }
            config.fallback_currency = currency;
        }

        if let Some(v) = get("MONY_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = parse_number("MONY_MAX_UPLOAD_BYTES", &v)?;
        }

        if let Some(v) = get("MONY_ACCEPTED_MEDIA_TYPES") {
            config.accepted_media_types = v
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            if config.accepted_media_types.is_empty() {
                return Err(Error::Config(
                    "MONY_ACCEPTED_MEDIA_TYPES must list at least one type".into(),
                ));
            }
        }

        if let Some(v) = get("MONY_EXTRACTION_TIMEOUT_SECS") {
            config.extraction.timeout =
                Duration::from_secs(parse_number("MONY_EXTRACTION_TIMEOUT_SECS", &v)?);
        }

        if let Some(v) = get("MONY_EXTRACTION_MAX_ATTEMPTS") {
            let attempts: u32 = parse_number("MONY_EXTRACTION_MAX_ATTEMPTS", &v)?;
            config.extraction.max_attempts = attempts.max(1);
        }

        if let Some(v) = get("MONY_EXTRACTION_RETRY_DELAY_MS") {
            config.extraction.retry_delay =
                Duration::from_millis(parse_number("MONY_EXTRACTION_RETRY_DELAY_MS", &v)?);
        }

        if let Some(v) = get("MONY_PROMPTS_DIR") {
            config.extraction.prompts_dir = Some(PathBuf::from(v));
        }

        if let Some(v) = get("MONY_MAX_PAGE_SIZE") {
            let size: i64 = parse_number("MONY_MAX_PAGE_SIZE", &v)?;
            if size < 1 {
                return Err(Error::Config("MONY_MAX_PAGE_SIZE must be at least 1".into()));
            }
            config.max_page_size = size;
        }

        if let Some(v) = get("MONY_CURRENCY_PRECISION") {
            let overrides = CurrencyTable::parse_overrides(&v)?;
            config.currencies = CurrencyTable::with_overrides(&overrides);
        }

        Ok(config)
    }

    /// Whether a (lowercase, parameter-free) MIME type is accepted
    pub fn accepts_media_type(&self, media_type: &str) -> bool {
        self.accepted_media_types.iter().any(|t| t == media_type)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} '{}' is not a valid number", key, value)))
}
