//! Mony Web Server
//!
//! Axum-based REST API for receipt extraction and transaction bookkeeping.
//!
//! - Receipt preview and promotion (multipart uploads)
//! - Transaction CRUD, listing, search and aggregation
//! - Uniform error payload: `{"error_kind", "message", "details"?}`

use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{PathRejection, QueryRejection},
        DefaultBodyLimit,
    },
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use mony_core::ai::{AIBackend, AIClient, ReceiptExtractor};
use mony_core::db::Database;
use mony_core::{Config, ReceiptPipeline};

mod handlers;

/// Room left in the request body limit for multipart framing and text parts
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub pipeline: ReceiptPipeline,
    pub ai: Option<AIClient>,
}

/// Create the application router, picking the AI backend from the environment
pub fn create_router(
    db: Database,
    config: Config,
    server_config: ServerConfig,
) -> mony_core::Result<Router> {
    let ai = AIClient::from_env();
    match ai {
        Some(ref client) => info!(
            host = %client.host(),
            model = %client.model(),
            "AI backend configured"
        ),
        None => info!("AI backend not configured (set OLLAMA_HOST to enable receipt extraction)"),
    }
    create_router_with_ai(db, config, server_config, ai)
}

/// Create the application router with an explicit AI client (for testing)
pub fn create_router_with_ai(
    db: Database,
    config: Config,
    server_config: ServerConfig,
    ai: Option<AIClient>,
) -> mony_core::Result<Router> {
    let config = Arc::new(config);
    let extractor = ai
        .clone()
        .map(|client| ReceiptExtractor::new(client, config.clone()))
        .transpose()?;
    let pipeline = ReceiptPipeline::new(db.clone(), config.clone(), extractor);
    let body_limit = config.max_upload_bytes + MULTIPART_OVERHEAD;

    let state = Arc::new(AppState {
        db,
        config,
        pipeline,
        ai,
    });

    let api_routes = Router::new()
        // Receipts
        .route("/receipts/extract", post(handlers::extract_receipt))
        .route("/receipts", post(handlers::submit_receipt))
        // Transactions
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route("/transactions/search", get(handlers::search_transactions))
        .route(
            "/transactions/summary/monthly",
            get(handlers::monthly_summary),
        )
        .route("/transactions/stats", get(handlers::statistics))
        .route(
            "/transactions/:id",
            get(handlers::get_transaction)
                .put(handlers::update_transaction)
                .delete(handlers::delete_transaction),
        );

    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if server_config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = server_config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    };

    Ok(Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}

/// Start the server
pub async fn serve(db: Database, config: Config, host: &str, port: u16) -> anyhow::Result<()> {
    serve_with_config(db, config, ServerConfig::default(), host, port).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    config: Config,
    server_config: ServerConfig,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    check_ai_connection().await;

    let app = create_router(db, config, server_config)?;
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection() {
    match AIClient::from_env() {
        Some(client) => {
            if client.health_check().await {
                info!(host = %client.host(), model = %client.model(), "AI backend connected");
            } else {
                warn!(
                    host = %client.host(),
                    model = %client.model(),
                    "AI backend configured but not responding"
                );
            }
        }
        None => {
            info!("AI backend not configured (set OLLAMA_HOST to enable receipt extraction)");
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error rendered as `{"error_kind", "message", "details"?}`
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error_kind: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a serde_json::Value>,
}

impl AppError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// A request the router could not decode (bad path segment, broken form)
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "InvalidRequest", message)
    }

    pub fn payload_too_large(limit: usize) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "PayloadTooLarge",
            format!("upload exceeds the {} byte limit", limit),
        )
    }

}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error_kind: self.kind,
            message: &self.message,
            details: self.details.as_ref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::invalid_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        mony_core::Error::InvalidFilter(rejection.body_text()).into()
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::invalid_request(format!("Expected a multipart form: {}", rejection.body_text()))
    }
}

impl From<mony_core::Error> for AppError {
    fn from(err: mony_core::Error) -> Self {
        use mony_core::Error;

        let status = match &err {
            Error::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::ExtractionTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::ExtractionUnavailable(_) | Error::Provider { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Error::ExtractionParse { .. } | Error::MalformedExtraction(_) => {
                StatusCode::BAD_GATEWAY
            }
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::InvalidSort(_) | Error::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut app_err = Self::new(status, err.kind(), err.to_string());

        match err {
            Error::Validation(errors) => {
                app_err.details = Some(serde_json::json!({ "fields": errors }));
            }
            ref other if status == StatusCode::INTERNAL_SERVER_ERROR => {
                // Full error for logs, generic message for clients
                error!(error = %other, "Internal error");
                app_err.message = "An internal error occurred".to_string();
            }
            _ => {}
        }

        app_err
    }
}

#[cfg(test)]
mod tests;
