//! Mock remote services for testing.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::service::{
    CalculationResult, CalculationService, CommitRequest, CommitService, ServiceError,
    TransactionResult, ValidationResult,
};
use crate::session::{OperationType, PaymentRecord};
use crate::ticket::TicketNo;

/// A recorded validate/calculate call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub operation: OperationType,
    pub tickets: Vec<TicketNo>,
}

/// Mock implementation of the CalculationService trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable validation and calculation results
/// - Track calls for assertions
/// - Simulate failures and network delays
pub struct MockCalculationService {
    validation: Arc<RwLock<ValidationResult>>,
    calculation: Arc<RwLock<CalculationResult>>,
    next_error: Arc<RwLock<Option<ServiceError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    validate_calls: Arc<RwLock<Vec<RecordedCall>>>,
    calculate_calls: Arc<RwLock<Vec<RecordedCall>>>,
}

impl Default for MockCalculationService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCalculationService {
    /// Create a mock that validates everything and calculates a zero total.
    pub fn new() -> Self {
        Self {
            validation: Arc::new(RwLock::new(ValidationResult::valid())),
            calculation: Arc::new(RwLock::new(CalculationResult {
                total_amount: Decimal::ZERO,
                breakdown: Vec::new(),
                fees: Vec::new(),
            })),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            validate_calls: Arc::new(RwLock::new(Vec::new())),
            calculate_calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set the validation result for subsequent calls.
    pub async fn set_validation(&self, result: ValidationResult) {
        *self.validation.write().await = result;
    }

    /// Set the full calculation result for subsequent calls.
    pub async fn set_calculation(&self, result: CalculationResult) {
        *self.calculation.write().await = result;
    }

    /// Set just the calculation total, with no breakdown or fees.
    pub async fn set_calculation_total(&self, total: Decimal) {
        *self.calculation.write().await = CalculationResult {
            total_amount: total,
            breakdown: Vec::new(),
            fees: Vec::new(),
        };
    }

    /// Configure the next call (validate or calculate) to fail.
    pub async fn fail_next(&self, error: ServiceError) {
        *self.next_error.write().await = Some(error);
    }

    /// Delay every call by the given duration, simulating a slow network.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn validate_calls(&self) -> Vec<RecordedCall> {
        self.validate_calls.read().await.clone()
    }

    pub async fn calculate_calls(&self) -> Vec<RecordedCall> {
        self.calculate_calls.read().await.clone()
    }

    async fn simulate_latency(&self) {
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn take_error(&self) -> Option<ServiceError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl CalculationService for MockCalculationService {
    async fn validate(
        &self,
        operation: OperationType,
        tickets: &[TicketNo],
        _payment: Option<&PaymentRecord>,
    ) -> Result<ValidationResult, ServiceError> {
        self.validate_calls.write().await.push(RecordedCall {
            operation,
            tickets: tickets.to_vec(),
        });

        self.simulate_latency().await;

        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        Ok(self.validation.read().await.clone())
    }

    async fn calculate(
        &self,
        operation: OperationType,
        tickets: &[TicketNo],
        _as_of: Option<NaiveDate>,
    ) -> Result<CalculationResult, ServiceError> {
        self.calculate_calls.write().await.push(RecordedCall {
            operation,
            tickets: tickets.to_vec(),
        });

        self.simulate_latency().await;

        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        Ok(self.calculation.read().await.clone())
    }
}

/// A recorded commit call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCommit {
    /// Which RPC was hit: "renewal", "redemption", "lost_report", "combined".
    pub endpoint: &'static str,
    pub request: CommitRequest,
}

/// Mock implementation of the CommitService trait.
pub struct MockCommitService {
    result: Arc<RwLock<TransactionResult>>,
    next_error: Arc<RwLock<Option<ServiceError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    commits: Arc<RwLock<Vec<RecordedCommit>>>,
}

impl Default for MockCommitService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCommitService {
    /// Create a mock that commits successfully with transaction id "T100".
    pub fn new() -> Self {
        Self {
            result: Arc::new(RwLock::new(TransactionResult {
                transaction_id: "T100".to_string(),
                receipts: vec!["R-T100".to_string()],
                updated_tickets: Vec::new(),
                new_tickets: Vec::new(),
                total_amount: Decimal::ZERO,
                change_amount: None,
            })),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            commits: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set the result returned by subsequent commits.
    pub async fn set_result(&self, result: TransactionResult) {
        *self.result.write().await = result;
    }

    /// Configure the next commit to fail.
    pub async fn fail_next(&self, error: ServiceError) {
        *self.next_error.write().await = Some(error);
    }

    /// Delay every commit by the given duration.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Get recorded commits.
    pub async fn commits(&self) -> Vec<RecordedCommit> {
        self.commits.read().await.clone()
    }

    pub async fn commit_count(&self) -> usize {
        self.commits.read().await.len()
    }

    async fn commit(
        &self,
        endpoint: &'static str,
        request: &CommitRequest,
    ) -> Result<TransactionResult, ServiceError> {
        self.commits.write().await.push(RecordedCommit {
            endpoint,
            request: request.clone(),
        });

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        Ok(self.result.read().await.clone())
    }
}

#[async_trait]
impl CommitService for MockCommitService {
    async fn commit_renewal(
        &self,
        request: &CommitRequest,
    ) -> Result<TransactionResult, ServiceError> {
        self.commit("renewal", request).await
    }

    async fn commit_redemption(
        &self,
        request: &CommitRequest,
    ) -> Result<TransactionResult, ServiceError> {
        self.commit("redemption", request).await
    }

    async fn commit_lost_report(
        &self,
        request: &CommitRequest,
    ) -> Result<TransactionResult, ServiceError> {
        self.commit("lost_report", request).await
    }

    async fn commit_combined(
        &self,
        request: &CommitRequest,
    ) -> Result<TransactionResult, ServiceError> {
        self.commit("combined", request).await
    }
}
