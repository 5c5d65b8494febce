//! Error type for workflow engine operations.

use thiserror::Error;

use crate::authorize::AuthorizationError;
use crate::history::HistoryError;
use crate::service::ServiceError;
use crate::session::SessionError;

/// Error type for engine operations.
///
/// Variants that wrap another error type pass its message through
/// unchanged; the server layer maps each variant to an HTTP status.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Session lifecycle violation (no session, already active, ...).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A network-backed step is already in flight; callers must wait for
    /// it to resolve rather than queue behind it.
    #[error("another workflow operation is already in progress")]
    OperationInProgress,

    /// The current state's precondition is not met.
    #[error("cannot proceed: {0}")]
    GuardFailed(String),

    /// The remote validation rejected the ticket set.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The ticket set changed while validation was in flight; the
    /// resolved result was discarded.
    #[error("ticket set changed during validation; validate again")]
    StaleValidation,

    /// The payment does not cover the calculated total.
    #[error("calculation check failed: {0}")]
    Calculation(String),

    /// The ticket set changed while calculation was in flight; the
    /// resolved result was discarded.
    #[error("ticket set changed during calculation; recalculate")]
    StaleCalculation,

    /// The staff authorization policy rejected the entered credentials.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// A remote service call failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The durable history store failed.
    #[error(transparent)]
    History(#[from] HistoryError),

    /// The session is in a terminal state; only end or reset apply.
    #[error("session is in terminal state {0}")]
    TerminalState(String),
}
