//! Test utilities for mony-core
//!
//! A mock Ollama server that answers `/api/generate` with a canned receipt,
//! for backend and end-to-end tests without a running model.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Receipt returned by the mock `/api/generate` endpoint
pub const MOCK_RECEIPT_RESPONSE: &str = r#"Here is the extracted receipt:
```json
{
  "merchant": "Target",
  "date": "2024-01-15",
  "total_amount": 27.00,
  "currency": "USD",
  "payment_method": "card",
  "category": "shopping",
  "description": "Clothing purchase",
  "receipt_number": "T-0001",
  "taxes": 2.00,
  "items": [
    {"name": "T-shirt", "quantity": 1, "unit_price": 25.00, "total_price": 25.00}
  ]
}
```"#;

/// Generate request as received by the mock server
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[allow(dead_code)]
    pub stream: bool,
}

#[derive(Clone)]
struct MockState {
    fail_status: Option<u16>,
    hits: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<GenerateRequest>>>,
}

/// Mock Ollama server for testing and development
pub struct MockOllamaServer {
    addr: SocketAddr,
    state: MockState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOllamaServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        Self::spawn(None).await
    }

    /// Start a server whose generate endpoint always answers with `status`
    pub async fn failing(status: u16) -> Self {
        Self::spawn(Some(status)).await
    }

    async fn spawn(fail_status: Option<u16>) -> Self {
        let state = MockState {
            fail_status,
            hits: Arc::new(AtomicUsize::new(0)),
            last_request: Arc::new(Mutex::new(None)),
        };

        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of generate calls received
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Most recent generate request
    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.state.last_request.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOllamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Ollama tags endpoint response (health check)
async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![ModelInfo {
            name: "llama3.2-vision:latest".to_string(),
            modified_at: "2024-01-01T00:00:00Z".to_string(),
            size: 7_900_000_000,
        }],
    })
}

async fn handle_generate(
    State(state): State<MockState>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let model = request.model.clone();
    *state.last_request.lock().unwrap() = Some(request);

    if let Some(status) = state.fail_status {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, "mock failure").into_response();
    }

    Json(GenerateResponse {
        model,
        response: MOCK_RECEIPT_RESPONSE.to_string(),
        done: true,
    })
    .into_response()
}

#[derive(Debug, Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    name: String,
    modified_at: String,
    size: u64,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    model: String,
    response: String,
    done: bool,
}
