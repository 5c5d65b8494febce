//! Service traits implemented by the HTTP client and the test mocks.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::session::{OperationType, PaymentRecord, StaffCredential};
use crate::ticket::TicketNo;

use super::{CalculationResult, ServiceError, TransactionResult, ValidationResult};

/// Remote validation and totals calculation.
#[async_trait]
pub trait CalculationService: Send + Sync {
    /// Validate the ticket set against business rules for the operation.
    async fn validate(
        &self,
        operation: OperationType,
        tickets: &[TicketNo],
        payment: Option<&PaymentRecord>,
    ) -> Result<ValidationResult, ServiceError>;

    /// Compute totals for the ticket set as of the given date (today when
    /// absent). Idempotent for the same ticket set.
    async fn calculate(
        &self,
        operation: OperationType,
        tickets: &[TicketNo],
        as_of: Option<NaiveDate>,
    ) -> Result<CalculationResult, ServiceError>;
}

/// Everything a commit RPC needs: the tickets being settled, the payment,
/// and the authorizing staff credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommitRequest {
    pub tickets: Vec<TicketNo>,
    pub payment: PaymentRecord,
    pub staff: Vec<StaffCredential>,
}

/// Remote commit endpoints, one RPC per operation type.
#[async_trait]
pub trait CommitService: Send + Sync {
    async fn commit_renewal(&self, request: &CommitRequest)
        -> Result<TransactionResult, ServiceError>;

    async fn commit_redemption(
        &self,
        request: &CommitRequest,
    ) -> Result<TransactionResult, ServiceError>;

    async fn commit_lost_report(
        &self,
        request: &CommitRequest,
    ) -> Result<TransactionResult, ServiceError>;

    async fn commit_combined(
        &self,
        request: &CommitRequest,
    ) -> Result<TransactionResult, ServiceError>;
}
