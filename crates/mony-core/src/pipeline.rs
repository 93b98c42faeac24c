//! Receipt pipeline
//!
//! Per request: `Received -> Validated -> Extracting -> Normalized`, then either
//! `Returned` (preview) or `Persisted` (promotion). Any step may exit early to
//! `Rejected` (bad upload) or `Failed` (extraction or store error).
//!
//! The upload is checked before the model is touched, so an input that can never
//! succeed costs nothing. Extraction failures never create a transaction row.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ai::ReceiptExtractor;
use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, FieldError, Result};
use crate::models::{ExtractionOutcome, ReceiptExtraction, Transaction, TransactionType, Warning};

/// Lifecycle of a single receipt request, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    Extracting,
    Normalized,
    Persisted,
    Returned,
    Rejected,
    Failed,
}

/// A promoted receipt: the stored row plus the extraction it came from
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptSubmission {
    pub transaction: Transaction,
    pub receipt: ReceiptExtraction,
    pub warnings: Vec<Warning>,
}

#[derive(Clone)]
pub struct ReceiptPipeline {
    db: Database,
    config: Arc<Config>,
    /// `None` when no vision model is configured
    extractor: Option<ReceiptExtractor>,
}

impl ReceiptPipeline {
    pub fn new(db: Database, config: Arc<Config>, extractor: Option<ReceiptExtractor>) -> Self {
        Self {
            db,
            config,
            extractor,
        }
    }

    /// Check type then size. Returns the normalized media type.
    pub fn validate_upload(&self, media_type: &str, size: usize) -> Result<String> {
        let media_type = normalize_media_type(media_type);

        if !self.config.accepts_media_type(&media_type) {
            return Err(Error::UnsupportedMediaType(if media_type.is_empty() {
                "missing content type".to_string()
            } else {
                media_type
            }));
        }

        if size > self.config.max_upload_bytes {
            return Err(Error::PayloadTooLarge {
                size,
                limit: self.config.max_upload_bytes,
            });
        }

        if size == 0 {
            return Err(Error::field("receipt", "uploaded image is empty"));
        }

        Ok(media_type)
    }

    /// Read a receipt without storing anything
    pub async fn extract(&self, image: &[u8], media_type: &str) -> Result<ExtractionOutcome> {
        let outcome = self.run(image, media_type).await?;
        debug!(stage = ?Stage::Returned, "Receipt returned without persisting");
        Ok(outcome)
    }

    /// Read a receipt and store it as a transaction of `transaction_type`.
    ///
    /// Identical uploads are not coalesced: each call inserts a new row.
    pub async fn submit(
        &self,
        image: &[u8],
        media_type: &str,
        transaction_type: TransactionType,
    ) -> Result<ReceiptSubmission> {
        let outcome = self.run(image, media_type).await?;

        let new_tx = outcome
            .receipt
            .clone()
            .into_new_transaction(transaction_type)
            .prepare(&self.config)
            .map_err(receipt_field_names)
            .inspect_err(|e| warn!(stage = ?Stage::Rejected, error = %e, "Receipt cannot be promoted"))?;

        let transaction = self.db.insert_transaction(&new_tx).inspect_err(|e| {
            warn!(stage = ?Stage::Failed, error = %e, "Failed to persist receipt")
        })?;

        info!(
            stage = ?Stage::Persisted,
            transaction_id = transaction.id,
            merchant = %transaction.merchant,
            "Receipt promoted to transaction"
        );

        Ok(ReceiptSubmission {
            transaction,
            receipt: outcome.receipt,
            warnings: outcome.warnings,
        })
    }

    async fn run(&self, image: &[u8], media_type: &str) -> Result<ExtractionOutcome> {
        debug!(stage = ?Stage::Received, media_type, bytes = image.len(), "Receipt received");

        let media_type = self.validate_upload(media_type, image.len()).inspect_err(|e| {
            warn!(stage = ?Stage::Rejected, error = %e, "Receipt upload rejected")
        })?;
        debug!(stage = ?Stage::Validated, media_type = %media_type, "Receipt upload accepted");

        let extractor = self.extractor.as_ref().ok_or_else(|| {
            Error::ExtractionUnavailable("no vision model is configured".to_string())
        })?;

        debug!(stage = ?Stage::Extracting, "Extracting receipt");
        let received = Utc::now().date_naive();
        let outcome = extractor
            .extract(image, &media_type, received)
            .await
            .inspect_err(|e| warn!(stage = ?Stage::Failed, error = %e, "Receipt extraction failed"))?;

        info!(
            stage = ?Stage::Normalized,
            merchant = %outcome.receipt.merchant,
            total = %outcome.receipt.total_amount,
            currency = %outcome.receipt.currency,
            warnings = outcome.warnings.len(),
            "Receipt extracted"
        );
        Ok(outcome)
    }
}

/// Lowercase and strip parameters (`image/PNG; q=1` -> `image/png`)
pub fn normalize_media_type(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

/// Guess an image type from a file name's extension
pub fn guess_media_type_from_filename(filename: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(filename)
        .extension()?
        .to_str()?
        .to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

/// Report promotion failures with the receipt's field names
fn receipt_field_names(err: Error) -> Error {
    match err {
        Error::Validation(errors) => Error::Validation(
            errors
                .into_iter()
                .map(|e| match e.field.as_str() {
                    "amount" => FieldError::new("total_amount", e.message),
                    "reference_number" => FieldError::new("receipt_number", e.message),
                    _ => e,
                })
                .collect(),
        ),
        other => other,
    }
}
