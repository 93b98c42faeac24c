//! Ollama backend implementation
//!
//! Sends the receipt image to `/api/generate` with the prompt and returns the
//! model's raw text. Parsing happens in the extractor.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

use super::AIBackend;

/// Default vision model when neither `OLLAMA_VISION_MODEL` nor `OLLAMA_MODEL` is set
pub const DEFAULT_OLLAMA_VISION_MODEL: &str = "llama3.2-vision";

/// Ollama HTTP backend
#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Create from environment variables
    ///
    /// `OLLAMA_HOST` is required. The model comes from `OLLAMA_VISION_MODEL`,
    /// then `OLLAMA_MODEL`, then [`DEFAULT_OLLAMA_VISION_MODEL`].
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        let model = std::env::var("OLLAMA_VISION_MODEL")
            .or_else(|_| std::env::var("OLLAMA_MODEL"))
            .unwrap_or_else(|_| DEFAULT_OLLAMA_VISION_MODEL.to_string());
        Some(Self::new(&host, &model))
    }
}

/// Request to Ollama API with images (for vision models)
#[derive(Debug, Serialize)]
struct OllamaVisionRequest {
    model: String,
    prompt: String,
    images: Vec<String>,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl AIBackend for OllamaBackend {
    async fn vision_completion(
        &self,
        prompt: &str,
        image_data: &[u8],
        _media_type: &str,
    ) -> Result<String> {
        let request = OllamaVisionRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            images: vec![base64::engine::general_purpose::STANDARD.encode(image_data)],
            stream: false,
            format: "json",
            options: OllamaOptions { temperature: 0.1 },
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let ollama_response: OllamaResponse = serde_json::from_str(&body).map_err(|e| {
            Error::ExtractionUnavailable(format!("unexpected response from Ollama: {}", e))
        })?;
        debug!(
            model = %self.model,
            chars = ollama_response.response.len(),
            "Ollama vision response received"
        );

        Ok(ollama_response.response)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
