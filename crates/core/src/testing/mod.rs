//! Testing utilities and mock implementations for workflow tests.
//!
//! This module provides mock implementations of the remote service traits,
//! allowing full workflow testing without a back-office gateway.
//!
//! # Example
//!
//! ```rust,ignore
//! use pledgedesk_core::testing::{fixtures, MockCalculationService, MockCommitService};
//!
//! let calc = MockCalculationService::new();
//! let commit = MockCommitService::new();
//!
//! // Configure mock responses
//! calc.set_calculation_total(dec!(36)).await;
//! commit.fail_next(ServiceError::Network("down".into())).await;
//!
//! // Use in a WorkflowEngine...
//! ```

mod mock_services;

pub use mock_services::{MockCalculationService, MockCommitService, RecordedCall, RecordedCommit};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use crate::session::{PaymentRecord, StaffCredential};
    use crate::ticket::{TicketRef, TicketStatus};

    /// A ticket snapshot with reasonable defaults.
    pub fn ticket(no: &str, principal: Decimal, interest: Decimal) -> TicketRef {
        TicketRef {
            ticket_no: no.parse().expect("valid ticket number"),
            customer_name: "Tan Ah Kow".to_string(),
            customer_id: Some("S1234567D".to_string()),
            pledge_description: "916 gold chain 12g".to_string(),
            principal,
            interest_due: interest,
            penalty_due: Decimal::ZERO,
            pledge_date: NaiveDate::from_ymd_opt(2025, 1, 14).unwrap(),
            expiry_date: NaiveDate::from_ymd_opt(2025, 7, 14).unwrap(),
            status: TicketStatus::Unredeemed,
            added_at: Utc::now(),
        }
    }

    /// A ticket snapshot marked ready for redemption.
    pub fn redemption_ticket(no: &str, principal: Decimal, interest: Decimal) -> TicketRef {
        let mut t = ticket(no, principal, interest);
        t.status = TicketStatus::RedemptionReady;
        t
    }

    /// A cash-only payment.
    pub fn cash_payment(amount: Decimal) -> PaymentRecord {
        PaymentRecord {
            cash_amount: amount,
            digital_amount: Decimal::ZERO,
            reference: None,
        }
    }

    /// A regular staff credential.
    pub fn staff(code: &str) -> StaffCredential {
        StaffCredential::new(code.to_string(), "1234".to_string())
    }

    /// A staff credential with the manager flag set.
    pub fn manager(code: &str) -> StaffCredential {
        StaffCredential::new(code.to_string(), "1234".to_string())
            .with_profile("Duty Manager", true)
    }
}
