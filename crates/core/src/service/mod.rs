//! Consumed remote-service contracts.
//!
//! The back-office talks to two remote collaborators: the calculation
//! service (validation + interest/penalty math) and the commit service
//! (one RPC per operation type). Both sit behind the branch's resilient
//! network client, which owns retry, backoff, token refresh, and the
//! circuit breaker; from this side a [`ServiceError::CircuitOpen`] and a
//! final-retry exhaustion look the same and are never retried locally.

mod http;
mod traits;
mod types;

pub use http::{HttpBackOfficeClient, RemoteServiceConfig};
pub use traits::{CalculationService, CommitRequest, CommitService};
pub use types::{
    CalculationOutcome, CalculationResult, FeeLine, FieldMessage, ServiceError, TicketBreakdown,
    TransactionResult, ValidationOutcome, ValidationResult,
};
