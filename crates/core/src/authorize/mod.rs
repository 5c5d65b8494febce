//! Staff authorization policy for transaction processing.
//!
//! Large or bulky transactions need more than one pair of eyes: past a
//! configurable ticket count or net amount a second staff member must
//! countersign, and past a higher amount one of them must be a manager.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::session::StaffCredential;

fn default_dual_staff_ticket_count() -> usize {
    5
}

fn default_dual_staff_amount() -> Decimal {
    Decimal::new(10_000, 0)
}

fn default_manager_approval_amount() -> Decimal {
    Decimal::new(50_000, 0)
}

/// Thresholds that decide how many staff sign-offs a transaction needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPolicy {
    /// Ticket count at or above which two staff members must sign.
    #[serde(default = "default_dual_staff_ticket_count")]
    pub dual_staff_ticket_count: usize,
    /// Absolute net amount at or above which two staff members must sign.
    #[serde(default = "default_dual_staff_amount")]
    pub dual_staff_amount: Decimal,
    /// Absolute net amount at or above which a manager must be among the signers.
    #[serde(default = "default_manager_approval_amount")]
    pub manager_approval_amount: Decimal,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            dual_staff_ticket_count: default_dual_staff_ticket_count(),
            dual_staff_amount: default_dual_staff_amount(),
            manager_approval_amount: default_manager_approval_amount(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthorizationError {
    #[error("No staff credential entered")]
    NoCredentials,
    #[error("Duplicate staff code: {0}")]
    DuplicateStaffCode(String),
    #[error("Transaction requires a second staff member")]
    DualStaffRequired,
    #[error("Transaction requires manager approval")]
    ManagerApprovalRequired,
}

impl AuthPolicy {
    /// Whether the transaction needs two distinct staff signatures.
    /// Thresholds compare against the absolute net amount, so a large
    /// payout is gated the same as a large collection.
    pub fn requires_dual_staff(&self, ticket_count: usize, net_amount: Decimal) -> bool {
        ticket_count >= self.dual_staff_ticket_count
            || net_amount.abs() >= self.dual_staff_amount
    }

    /// Whether one of the signers must hold the manager flag.
    pub fn requires_manager_approval(&self, net_amount: Decimal) -> bool {
        net_amount.abs() >= self.manager_approval_amount
    }

    /// Check the entered credentials against this policy.
    pub fn check(
        &self,
        credentials: &[StaffCredential],
        ticket_count: usize,
        net_amount: Decimal,
    ) -> Result<(), AuthorizationError> {
        if credentials.is_empty() {
            return Err(AuthorizationError::NoCredentials);
        }

        let mut codes = HashSet::new();
        for credential in credentials {
            if !codes.insert(credential.staff_code.as_str()) {
                return Err(AuthorizationError::DuplicateStaffCode(
                    credential.staff_code.clone(),
                ));
            }
        }

        if self.requires_dual_staff(ticket_count, net_amount) && codes.len() < 2 {
            return Err(AuthorizationError::DualStaffRequired);
        }

        if self.requires_manager_approval(net_amount)
            && !credentials.iter().any(|c| c.is_manager())
        {
            return Err(AuthorizationError::ManagerApprovalRequired);
        }

        Ok(())
    }
}
