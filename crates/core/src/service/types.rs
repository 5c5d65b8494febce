//! Types for the remote calculation and commit services.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ticket::TicketNo;

/// Error type for remote service calls.
///
/// `CircuitOpen` and `Network` both mean "transient infrastructure
/// failure, try again shortly"; the orchestrator records them and never
/// retries on its own.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The resilient client refused the call; the breaker is open.
    #[error("service temporarily unavailable, try again shortly")]
    CircuitOpen,

    /// Transport failure after the client exhausted its retries.
    #[error("network error: {0}")]
    Network(String),

    /// The service rejected our credentials even after a token refresh.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The service answered with a business-level failure.
    #[error("remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// The service answered with something we could not decode.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// Validation
// ============================================================================

/// A field-scoped message in a validation response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldMessage {
    /// Field path the message applies to, e.g. `"tickets[0].expiry_date"`.
    pub field: String,
    pub message: String,
}

/// Outcome of validating the ticket set against business rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Ordered, field-scoped errors.
    #[serde(default)]
    pub errors: Vec<FieldMessage>,
    /// Ordered, field-scoped warnings; do not block progression.
    #[serde(default)]
    pub warnings: Vec<FieldMessage>,
}

impl ValidationResult {
    /// A clean pass with no messages.
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A failing result with a single field error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![FieldMessage {
                field: field.into(),
                message: message.into(),
            }],
            warnings: Vec::new(),
        }
    }

    /// One-line summary of the errors, for the session error map.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ============================================================================
// Calculation
// ============================================================================

/// Per-ticket amounts in a calculation response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketBreakdown {
    pub ticket_no: TicketNo,
    pub principal: Decimal,
    pub interest: Decimal,
    pub penalty: Decimal,
    pub total: Decimal,
}

/// A named fee in a calculation response, e.g. a lost-report filing fee.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeLine {
    pub name: String,
    pub amount: Decimal,
}

/// Totals computed by the remote calculation service. The interest and
/// penalty formulas live entirely on that side; nothing here re-derives
/// them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalculationResult {
    pub total_amount: Decimal,
    #[serde(default)]
    pub breakdown: Vec<TicketBreakdown>,
    #[serde(default)]
    pub fees: Vec<FeeLine>,
}

// ============================================================================
// Snapshot-keyed outcomes
// ============================================================================

/// A validation result pinned to the ticket-set revision it was computed
/// against. Stale once the revision moves on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub result: ValidationResult,
    pub revision: u64,
    pub duration_ms: u64,
    pub computed_at: DateTime<Utc>,
}

/// A calculation result pinned to the ticket-set revision it was computed
/// against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalculationOutcome {
    pub result: CalculationResult,
    pub revision: u64,
    pub duration_ms: u64,
    pub computed_at: DateTime<Utc>,
}

// ============================================================================
// Commit result
// ============================================================================

/// Outcome of a remote commit RPC.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionResult {
    /// Server-generated transaction identifier.
    pub transaction_id: String,
    /// Receipt references for printing.
    #[serde(default)]
    pub receipts: Vec<String>,
    /// Tickets updated in place (renewed, redeemed, reported lost).
    #[serde(default)]
    pub updated_tickets: Vec<TicketNo>,
    /// Newly issued tickets (renewal books a fresh ticket number).
    #[serde(default)]
    pub new_tickets: Vec<TicketNo>,
    pub total_amount: Decimal,
    /// Change due back to the customer, when cash tendered exceeds totals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_amount: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validation_result_helpers() {
        let ok = ValidationResult::valid();
        assert!(ok.is_valid);
        assert!(ok.summary().is_empty());

        let bad = ValidationResult::invalid("tickets[0].status", "ticket already redeemed");
        assert!(!bad.is_valid);
        assert_eq!(bad.summary(), "tickets[0].status: ticket already redeemed");
    }

    #[test]
    fn test_service_error_display() {
        assert_eq!(
            ServiceError::CircuitOpen.to_string(),
            "service temporarily unavailable, try again shortly"
        );
        let err = ServiceError::Remote {
            status: 422,
            message: "ticket expired".to_string(),
        };
        assert_eq!(err.to_string(), "remote error (422): ticket expired");
    }

    #[test]
    fn test_transaction_result_serialization() {
        let result = TransactionResult {
            transaction_id: "T100".to_string(),
            receipts: vec!["R-1".to_string()],
            updated_tickets: vec!["B/0725/1234".parse().unwrap()],
            new_tickets: vec![],
            total_amount: dec!(36),
            change_amount: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#""transaction_id":"T100""#));
        assert!(!json.contains("change_amount"));

        let parsed: TransactionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn test_calculation_result_defaults() {
        let json = r#"{"total_amount":"36"}"#;
        let parsed: CalculationResult = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.total_amount, dec!(36));
        assert!(parsed.breakdown.is_empty());
        assert!(parsed.fees.is_empty());
    }
}
