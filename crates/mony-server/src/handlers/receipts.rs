//! Receipt handlers

use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use tracing::debug;

use crate::{AppError, AppState};
use mony_core::models::{ExtractionOutcome, TransactionType};
use mony_core::pipeline::guess_media_type_from_filename;
use mony_core::{Error, ReceiptSubmission};

/// Multipart part names accepted for the image
const IMAGE_PARTS: &[&str] = &["receipt", "file", "image"];

/// A receipt upload pulled out of a multipart form
struct ReceiptUpload {
    bytes: Vec<u8>,
    media_type: String,
    transaction_type: Option<String>,
}

/// POST /api/receipts/extract - Read a receipt without storing it
pub async fn extract_receipt(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractionOutcome>, AppError> {
    let upload = read_upload(multipart?, state.config.max_upload_bytes).await?;
    let outcome = state
        .pipeline
        .extract(&upload.bytes, &upload.media_type)
        .await?;
    Ok(Json(outcome))
}

/// POST /api/receipts - Read a receipt and store it as a transaction
pub async fn submit_receipt(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ReceiptSubmission>), AppError> {
    let upload = read_upload(multipart?, state.config.max_upload_bytes).await?;

    let transaction_type = match upload.transaction_type.as_deref().map(str::trim) {
        None | Some("") => TransactionType::Expense,
        Some(t) => t
            .parse()
            .map_err(|e: String| Error::field("transaction_type", e))?,
    };

    let submission = state
        .pipeline
        .submit(&upload.bytes, &upload.media_type, transaction_type)
        .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

async fn read_upload(mut multipart: Multipart, limit: usize) -> Result<ReceiptUpload, AppError> {
    let mut image: Option<(Vec<u8>, String)> = None;
    let mut transaction_type = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or("").to_string();
        if IMAGE_PARTS.contains(&name.as_str()) {
            // Declared type wins; otherwise guess from the file name
            let media_type = field
                .content_type()
                .map(str::to_string)
                .filter(|t| !t.trim().is_empty() && t != "application/octet-stream")
                .or_else(|| {
                    field
                        .file_name()
                        .and_then(guess_media_type_from_filename)
                        .map(str::to_string)
                })
                .unwrap_or_default();
            let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
            debug!(part = %name, media_type = %media_type, bytes = bytes.len(), "Receipt part read");
            image = Some((bytes.to_vec(), media_type));
        } else if name == "transaction_type" || name == "type" {
            transaction_type = Some(field.text().await.map_err(|e| multipart_error(e, limit))?);
        }
    }

    let (bytes, media_type) = image
        .ok_or_else(|| Error::field("receipt", "a 'receipt' image part is required"))?;

    Ok(ReceiptUpload {
        bytes,
        media_type,
        transaction_type,
    })
}

fn multipart_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::payload_too_large(limit)
    } else {
        AppError::invalid_request(format!("Failed to read multipart form: {}", err.body_text()))
    }
}
