//! Receipt extraction client
//!
//! Wraps an [`AIClient`] with the receipt prompt, a per-call deadline, a
//! small retry budget for transient transport failures, JSON recovery and
//! schema validation.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::ExtractionOutcome;
use crate::prompts::{load_prompt, PromptId};
use crate::validate::validate_extraction;

use super::parsing::parse_model_json;
use super::{AIBackend, AIClient};

#[derive(Clone)]
pub struct ReceiptExtractor {
    client: AIClient,
    prompt: Arc<str>,
    config: Arc<Config>,
}

impl ReceiptExtractor {
    /// Load the receipt prompt (honoring `prompts_dir`) and wrap the client
    pub fn new(client: AIClient, config: Arc<Config>) -> Result<Self> {
        let prompt = load_prompt(
            PromptId::ExtractReceipt,
            config.extraction.prompts_dir.as_deref(),
        )?;
        Ok(Self {
            client,
            prompt: Arc::from(prompt.user_text()),
            config,
        })
    }

    /// Read a receipt image.
    ///
    /// `received` stands in for the receipt date when none can be read.
    pub async fn extract(
        &self,
        image_data: &[u8],
        media_type: &str,
        received: NaiveDate,
    ) -> Result<ExtractionOutcome> {
        let raw = self.complete(image_data, media_type).await?;
        let value = parse_model_json(&raw)?;
        let outcome = validate_extraction(&value, &self.config, received)?;

        if !outcome.warnings.is_empty() {
            info!(
                warnings = outcome.warnings.len(),
                "Receipt normalized with warnings"
            );
        }
        Ok(outcome)
    }

    /// Call the model, retrying transient failures. A timeout is never retried.
    async fn complete(&self, image_data: &[u8], media_type: &str) -> Result<String> {
        let settings = &self.config.extraction;
        let max_attempts = settings.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            info!(
                model = %self.client.model(),
                host = %self.client.host(),
                attempt,
                bytes = image_data.len(),
                "Calling vision model"
            );

            let call = self
                .client
                .vision_completion(&self.prompt, image_data, media_type);

            let err = match tokio::time::timeout(settings.timeout, call).await {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(err)) => err,
                Err(_) => {
                    warn!(timeout = ?settings.timeout, "Vision model call timed out");
                    return Err(Error::ExtractionTimeout(settings.timeout));
                }
            };

            if !is_transient(&err) {
                warn!(error = %err, "Vision model call failed");
                return Err(match err {
                    Error::Http(e) => Error::ExtractionUnavailable(e.to_string()),
                    other => other,
                });
            }

            if attempt >= max_attempts {
                warn!(attempt, error = %err, "Vision model unavailable, giving up");
                return Err(Error::ExtractionUnavailable(format!(
                    "model provider failed after {} attempt(s): {}",
                    attempt, err
                )));
            }

            warn!(attempt, error = %err, "Transient vision model failure, retrying");
            tokio::time::sleep(settings.retry_delay).await;
        }
    }
}

/// Connection-level failures and provider 5xx answers
fn is_transient(err: &Error) -> bool {
    match err {
        Error::Http(e) => e.is_connect() || e.is_timeout() || e.is_request() || e.is_body(),
        Error::Provider { status, .. } => *status >= 500,
        _ => false,
    }
}
