//! Mapping of engine errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use pledgedesk_core::history::HistoryError;
use pledgedesk_core::session::SessionError;
use pledgedesk_core::{ServiceError, WorkflowError};

/// Error body returned for all failed API calls.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Wrapper turning a [`WorkflowError`] into an HTTP response.
pub struct ApiError(pub WorkflowError);

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        Self(err)
    }
}

impl From<HistoryError> for ApiError {
    fn from(err: HistoryError) -> Self {
        Self(WorkflowError::History(err))
    }
}

fn status_for(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::Session(SessionError::NoActiveSession) => StatusCode::NOT_FOUND,
        WorkflowError::Session(_) => StatusCode::CONFLICT,
        WorkflowError::OperationInProgress | WorkflowError::TerminalState(_) => {
            StatusCode::CONFLICT
        }
        WorkflowError::GuardFailed(_)
        | WorkflowError::Validation(_)
        | WorkflowError::StaleValidation
        | WorkflowError::Calculation(_)
        | WorkflowError::StaleCalculation => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::Authorization(_) => StatusCode::FORBIDDEN,
        WorkflowError::Service(ServiceError::CircuitOpen)
        | WorkflowError::Service(ServiceError::Network(_)) => StatusCode::SERVICE_UNAVAILABLE,
        WorkflowError::Service(_) => StatusCode::BAD_GATEWAY,
        WorkflowError::History(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}
