//! Aggregation handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{AppError, AppState};
use mony_core::db::{parse_date_param, parse_int};
use mony_core::models::{MonthlySummary, Statistics};
use mony_core::Error;

#[derive(Debug, Deserialize)]
pub struct MonthlyQuery {
    pub year: Option<String>,
    pub month: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub currency: Option<String>,
}

/// GET /api/transactions/summary/monthly?year=&month=
pub async fn monthly_summary(
    State(state): State<Arc<AppState>>,
    params: Result<Query<MonthlyQuery>, QueryRejection>,
) -> Result<Json<MonthlySummary>, AppError> {
    let Query(params) = params?;
    let year = required_int("year", params.year.as_deref())?;
    let month = required_int("month", params.month.as_deref())?;

    let year = i32::try_from(year)
        .map_err(|_| Error::InvalidFilter(format!("year {} is out of range", year)))?;
    let month = u32::try_from(month)
        .map_err(|_| Error::InvalidFilter(format!("month must be between 1 and 12, got {}", month)))?;

    let summary = state
        .db
        .monthly_summary(year, month, params.currency.as_deref())?;
    Ok(Json(summary))
}

/// GET /api/transactions/stats
pub async fn statistics(
    State(state): State<Arc<AppState>>,
    params: Result<Query<StatsQuery>, QueryRejection>,
) -> Result<Json<Statistics>, AppError> {
    let Query(params) = params?;
    let from = parse_date_param("date_from", params.date_from.as_deref())?;
    let to = parse_date_param("date_to", params.date_to.as_deref())?;

    let stats = state
        .db
        .statistics(from, to, params.currency.as_deref())?;
    Ok(Json(stats))
}

fn required_int(name: &str, value: Option<&str>) -> Result<i64, Error> {
    parse_int(name, value)?.ok_or_else(|| Error::InvalidFilter(format!("{} is required", name)))
}
