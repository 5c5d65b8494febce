//! Completed transaction records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ticket::TicketNo;

/// A committed transaction, one record per settled ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transaction {
    /// Interest and penalty collected, pledge extended under a new ticket.
    Renewal {
        transaction_id: String,
        ticket_no: TicketNo,
        /// Replacement ticket issued by the back office, when known.
        new_ticket_no: Option<TicketNo>,
        amount: Decimal,
        receipts: Vec<String>,
        committed_at: DateTime<Utc>,
    },
    /// Principal plus charges collected, pledge released to the customer.
    Redemption {
        transaction_id: String,
        ticket_no: TicketNo,
        amount: Decimal,
        receipts: Vec<String>,
        committed_at: DateTime<Utc>,
    },
    /// Ticket declared lost, affidavit fee collected.
    LostReport {
        transaction_id: String,
        ticket_no: TicketNo,
        amount: Decimal,
        receipts: Vec<String>,
        committed_at: DateTime<Utc>,
    },
}

impl Transaction {
    pub fn transaction_id(&self) -> &str {
        match self {
            Transaction::Renewal { transaction_id, .. }
            | Transaction::Redemption { transaction_id, .. }
            | Transaction::LostReport { transaction_id, .. } => transaction_id,
        }
    }

    pub fn ticket_no(&self) -> &TicketNo {
        match self {
            Transaction::Renewal { ticket_no, .. }
            | Transaction::Redemption { ticket_no, .. }
            | Transaction::LostReport { ticket_no, .. } => ticket_no,
        }
    }

    pub fn amount(&self) -> Decimal {
        match self {
            Transaction::Renewal { amount, .. }
            | Transaction::Redemption { amount, .. }
            | Transaction::LostReport { amount, .. } => *amount,
        }
    }

    pub fn receipts(&self) -> &[String] {
        match self {
            Transaction::Renewal { receipts, .. }
            | Transaction::Redemption { receipts, .. }
            | Transaction::LostReport { receipts, .. } => receipts,
        }
    }

    pub fn committed_at(&self) -> DateTime<Utc> {
        match self {
            Transaction::Renewal { committed_at, .. }
            | Transaction::Redemption { committed_at, .. }
            | Transaction::LostReport { committed_at, .. } => *committed_at,
        }
    }

    /// Record kind as a string (for serialization and filtering).
    pub fn kind(&self) -> &'static str {
        match self {
            Transaction::Renewal { .. } => "renewal",
            Transaction::Redemption { .. } => "redemption",
            Transaction::LostReport { .. } => "lost_report",
        }
    }
}
