//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::{AppError, AppState};
use mony_core::db::{parse_int, ListParams};
use mony_core::models::{NewTransaction, Transaction, TransactionPage};
use mony_core::Error;

/// Query parameters for the search endpoint
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<String>,
}

/// POST /api/transactions - Create a transaction
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewTransaction>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    let tx = body(payload)?.prepare(&state.config)?;
    let created = state.db.insert_transaction(&tx)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/transactions - List transactions
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<TransactionPage>, AppError> {
    let Query(params) = params?;
    let (filter, sort, page) = params.parse(state.config.max_page_size)?;
    let page = state.db.list_transactions(&filter, sort, page)?;
    Ok(Json(page))
}

/// GET /api/transactions/search - Free-text search
pub async fn search_transactions(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let Query(params) = params?;
    let limit = parse_int("limit", params.limit.as_deref())?;
    let transactions = state
        .db
        .search_transactions(params.q.as_deref().unwrap_or(""), limit)?;
    Ok(Json(transactions))
}

/// GET /api/transactions/:id - Get a single transaction
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Transaction>, AppError> {
    let Path(id) = id?;
    let tx = state
        .db
        .get_transaction(id)?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(tx))
}

/// PUT /api/transactions/:id - Replace every editable field
pub async fn update_transaction(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<NewTransaction>, JsonRejection>,
) -> Result<Json<Transaction>, AppError> {
    let Path(id) = id?;
    let tx = body(payload)?.prepare(&state.config)?;
    let updated = state
        .db
        .update_transaction(id, &tx)?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(updated))
}

/// DELETE /api/transactions/:id - Delete a transaction
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    if state.db.delete_transaction(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

/// Unwrap a JSON body, reporting malformed input as a validation failure
fn body(payload: Result<Json<NewTransaction>, JsonRejection>) -> Result<NewTransaction, AppError> {
    payload
        .map(|Json(tx)| tx)
        .map_err(|rejection| Error::field("body", rejection.body_text()).into())
}

fn not_found(id: i64) -> AppError {
    Error::NotFound(format!("transaction {} not found", id)).into()
}
