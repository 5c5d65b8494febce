//! Session ticket-set handlers.
//!
//! Ticket numbers contain slashes ("B/0725/1234"), so remove and update
//! take the number in a JSON body rather than a path parameter.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use pledgedesk_core::{TicketNo, TicketPatch, TicketRef};

use super::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TicketNoBody {
    pub ticket_no: TicketNo,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketBody {
    pub ticket_no: TicketNo,
    pub fields: TicketPatch,
}

#[derive(Debug, Serialize)]
pub struct AddTicketResponse {
    /// False when the ticket was already in the session.
    pub added: bool,
    pub ticket_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearTicketsResponse {
    pub removed: usize,
}

pub async fn add_ticket(
    State(state): State<Arc<AppState>>,
    Json(ticket): Json<TicketRef>,
) -> Result<(StatusCode, Json<AddTicketResponse>), ApiError> {
    let added = state.engine().add_ticket(ticket).await?;
    let ticket_count = state
        .engine()
        .session_snapshot()
        .await
        .map(|s| s.tickets.len())
        .unwrap_or(0);
    let status = if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(AddTicketResponse { added, ticket_count })))
}

pub async fn remove_ticket(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TicketNoBody>,
) -> Result<StatusCode, ApiError> {
    match state.engine().remove_ticket(&body.ticket_no).await? {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Ok(StatusCode::NOT_FOUND),
    }
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdateTicketBody>,
) -> Result<StatusCode, ApiError> {
    let changed = state
        .engine()
        .update_ticket(&body.ticket_no, &body.fields)
        .await?;
    if changed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

pub async fn clear_tickets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClearTicketsResponse>, ApiError> {
    let removed = state.engine().clear_tickets().await?;
    Ok(Json(ClearTicketsResponse { removed }))
}
