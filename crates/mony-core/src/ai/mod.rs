//! Pluggable vision model backends
//!
//! # Architecture
//!
//! - `AIBackend` trait: one multimodal completion call plus health/identity
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OllamaBackend`, `OpenAICompatibleBackend`, `MockBackend`
//! - `ReceiptExtractor`: prompt, timeout, retry, JSON recovery and validation
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (ollama, openai_compatible, mock). Default: ollama
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama backend)
//! - `OLLAMA_VISION_MODEL` / `OLLAMA_MODEL`: Vision model name (default: llama3.2-vision)
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible backend)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

mod extractor;
mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;

pub use extractor::ReceiptExtractor;
pub use mock::{MockBackend, MockReply};
pub use ollama::{OllamaBackend, DEFAULT_OLLAMA_VISION_MODEL};
pub use openai_compatible::OpenAICompatibleBackend;

use async_trait::async_trait;

use crate::error::Result;

/// Trait implemented by every model provider
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Send a text instruction plus one image and return the raw text answer
    async fn vision_completion(
        &self,
        prompt: &str,
        image_data: &[u8],
        media_type: &str,
    ) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
#[derive(Clone)]
pub enum AIClient {
    /// Ollama backend (HTTP API)
    Ollama(OllamaBackend),
    /// OpenAI-compatible backend (vLLM, LocalAI, llama-server, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Returns None if the selected backend's host variable is not set.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());

        match backend.to_lowercase().as_str() {
            "ollama" => OllamaBackend::from_env().map(AIClient::Ollama),
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to ollama");
                OllamaBackend::from_env().map(AIClient::Ollama)
            }
        }
    }

    /// Create an Ollama backend directly
    pub fn ollama(host: &str, model: &str) -> Self {
        AIClient::Ollama(OllamaBackend::new(host, model))
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn vision_completion(
        &self,
        prompt: &str,
        image_data: &[u8],
        media_type: &str,
    ) -> Result<String> {
        match self {
            AIClient::Ollama(b) => b.vision_completion(prompt, image_data, media_type).await,
            AIClient::OpenAICompatible(b) => {
                b.vision_completion(prompt, image_data, media_type).await
            }
            AIClient::Mock(b) => b.vision_completion(prompt, image_data, media_type).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.model(),
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.host(),
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_client_mock() {
        let client = AIClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
    }

    #[test]
    fn test_ollama_client() {
        let client = AIClient::ollama("http://localhost:11434", "llava");
        assert_eq!(client.model(), "llava");
        assert_eq!(client.host(), "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_mock_delegation() {
        let client = AIClient::Mock(MockBackend::with_text("{}"));
        assert!(client.health_check().await);
        let text = client
            .vision_completion("p", b"img", "image/png")
            .await
            .unwrap();
        assert_eq!(text, "{}");
    }
}
