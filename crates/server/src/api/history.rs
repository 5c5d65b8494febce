//! Transaction history handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use pledgedesk_core::{HistoryFilter, Transaction};

use super::error::ApiError;
use crate::state::AppState;

/// Maximum allowed limit for history queries
const MAX_LIMIT: u32 = 1000;

/// Default limit for history queries
const DEFAULT_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct ListHistoryParams {
    /// Filter by pawn ticket number.
    pub ticket_no: Option<String>,
    /// Filter by record kind ("renewal", "redemption", "lost_report").
    pub kind: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ListHistoryResponse {
    pub transactions: Vec<Transaction>,
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

/// List committed transactions from the durable log, most recent first.
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListHistoryParams>,
) -> Result<Json<ListHistoryResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let mut filter = HistoryFilter::new().with_limit(limit).with_offset(offset);
    if let Some(ticket_no) = params.ticket_no {
        filter = filter.with_ticket_no(ticket_no);
    }
    if let Some(kind) = params.kind {
        filter = filter.with_kind(kind);
    }

    let transactions = state.history_store().list(&filter)?;
    let total = state.history_store().count(&filter)?;

    Ok(Json(ListHistoryResponse {
        transactions,
        total,
        limit,
        offset,
    }))
}

/// The in-memory recent ring, newest first. Serves receipt reprints
/// without a database round trip.
pub async fn recent_history(State(state): State<Arc<AppState>>) -> Json<Vec<Transaction>> {
    Json(state.engine().recent_transactions().await)
}

/// Look up one committed transaction by id, ring first then the store.
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<String>,
) -> Result<Json<Transaction>, (StatusCode, Json<serde_json::Value>)> {
    match state.engine().get_cached_transaction(&transaction_id).await {
        Ok(Some(transaction)) => Ok(Json(transaction)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "transaction not found" })),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )),
    }
}
