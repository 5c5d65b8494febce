//! Session lifecycle and workflow progression handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use pledgedesk_core::service::{CalculationResult, ValidationResult};
use pledgedesk_core::session::SessionError;
use pledgedesk_core::{
    OperationType, PaymentRecord, StaffCredential, TransactionSession, WorkflowError,
    WorkflowState,
};

use super::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartSessionBody {
    pub operation: OperationType,
}

#[derive(Debug, Deserialize, Default)]
pub struct EndSessionParams {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub state: WorkflowState,
    pub can_proceed: bool,
}

#[derive(Debug, Deserialize)]
pub struct StaffAuthBody {
    pub staff_code: String,
    pub pin: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_manager: bool,
}

#[derive(Debug, Deserialize)]
pub struct RemoveStaffBody {
    pub staff_code: String,
}

// ============================================================================
// Lifecycle
// ============================================================================

pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartSessionBody>,
) -> Result<(StatusCode, Json<TransactionSession>), ApiError> {
    let session = state.engine().start_session(body.operation).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TransactionSession>, ApiError> {
    match state.engine().session_snapshot().await {
        Some(session) => Ok(Json(session)),
        None => Err(ApiError::from(WorkflowError::Session(
            SessionError::NoActiveSession,
        ))),
    }
}

pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EndSessionParams>,
) -> Result<Json<TransactionSession>, ApiError> {
    match state.engine().end_session(params.reason).await {
        Some(session) => Ok(Json(session)),
        None => Err(ApiError::from(WorkflowError::Session(
            SessionError::NoActiveSession,
        ))),
    }
}

pub async fn cancel_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TransactionSession>, ApiError> {
    Ok(Json(state.engine().cancel_session().await?))
}

pub async fn reset_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TransactionSession>, ApiError> {
    Ok(Json(state.engine().reset_session().await?))
}

pub async fn pause_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StateResponse>, ApiError> {
    let state_after = state.engine().pause_session().await?;
    Ok(Json(StateResponse {
        state: state_after,
        can_proceed: state.engine().can_proceed_to_next_step().await,
    }))
}

pub async fn resume_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StateResponse>, ApiError> {
    let state_after = state.engine().resume_session().await?;
    Ok(Json(StateResponse {
        state: state_after,
        can_proceed: state.engine().can_proceed_to_next_step().await,
    }))
}

// ============================================================================
// Workflow progression
// ============================================================================

pub async fn advance(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StateResponse>, ApiError> {
    let state_after = state.engine().advance().await?;
    Ok(Json(StateResponse {
        state: state_after,
        can_proceed: state.engine().can_proceed_to_next_step().await,
    }))
}

pub async fn previous_step(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StateResponse>, ApiError> {
    let state_after = state.engine().go_to_previous_step().await?;
    Ok(Json(StateResponse {
        state: state_after,
        can_proceed: state.engine().can_proceed_to_next_step().await,
    }))
}

pub async fn retry_processing(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StateResponse>, ApiError> {
    let state_after = state.engine().retry_processing().await?;
    Ok(Json(StateResponse {
        state: state_after,
        can_proceed: state.engine().can_proceed_to_next_step().await,
    }))
}

// ============================================================================
// Pipeline steps on demand
// ============================================================================

pub async fn validate(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ValidationResult>, ApiError> {
    Ok(Json(state.engine().validate_tickets().await?))
}

pub async fn calculate(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CalculationResult>, ApiError> {
    Ok(Json(state.engine().calculate_totals().await?))
}

// ============================================================================
// Payment and staff
// ============================================================================

pub async fn set_payment(
    State(state): State<Arc<AppState>>,
    Json(payment): Json<PaymentRecord>,
) -> Result<StatusCode, ApiError> {
    state.engine().set_payment(payment).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_staff_auth(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StaffAuthBody>,
) -> Result<StatusCode, ApiError> {
    let mut credential = StaffCredential::new(body.staff_code, body.pin);
    if let Some(name) = body.name {
        credential = credential.with_profile(name, body.is_manager);
    }
    state.engine().add_staff_auth(credential).await?;
    Ok(StatusCode::CREATED)
}

pub async fn remove_staff_auth(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RemoveStaffBody>,
) -> Result<StatusCode, ApiError> {
    let removed = state.engine().remove_staff_auth(&body.staff_code).await?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

pub async fn clear_staff_auth(
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    state.engine().clear_staff_auth().await?;
    Ok(StatusCode::NO_CONTENT)
}
