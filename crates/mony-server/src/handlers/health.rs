//! Health handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use mony_core::ai::AIBackend;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// `healthy` when the database and the vision model both answer
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub ai: AiStatus,
}

#[derive(Debug, Serialize)]
pub struct AiStatus {
    pub configured: bool,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// GET /health - Database and AI backend reachability
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let database = state.db.ping();

    let ai = match state.ai {
        Some(ref client) => AiStatus {
            configured: true,
            available: client.health_check().await,
            model: Some(client.model().to_string()),
        },
        None => AiStatus {
            configured: false,
            available: false,
            model: None,
        },
    };

    let status = if database && ai.available {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthStatus {
        status,
        version: env!("CARGO_PKG_VERSION"),
        database,
        ai,
    })
}
