//! Settlement planning and result reconciliation.
//!
//! A combined operation mixes renewals and redemptions in one batch and
//! nets them into a single collect-or-pay amount. This module owns that
//! partitioning, the net-amount math the authorization gate runs on, and
//! the conversion of a remote commit result into history records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::history::Transaction;
use crate::service::{CalculationResult, TransactionResult};
use crate::session::OperationType;
use crate::ticket::{TicketRef, TicketSet};

/// How a combined batch splits by each ticket's own status flag.
#[derive(Debug, Clone)]
pub struct SettlementPlan {
    pub renewals: Vec<TicketRef>,
    pub redemptions: Vec<TicketRef>,
}

impl SettlementPlan {
    /// Signed net: positive collects from the customer, negative pays out.
    ///
    /// Renewals collect interest plus penalty; redemptions net off the
    /// outstanding principal.
    pub fn net_amount(&self) -> Decimal {
        let collected: Decimal = self.renewals.iter().map(|t| t.renewal_amount()).sum();
        let paid_out: Decimal = self.redemptions.iter().map(|t| t.principal).sum();
        collected - paid_out
    }

    pub fn collects_from_customer(&self) -> bool {
        self.net_amount() >= Decimal::ZERO
    }

    pub fn is_empty(&self) -> bool {
        self.renewals.is_empty() && self.redemptions.is_empty()
    }
}

/// Partition a ticket set for combined settlement. A ticket marked
/// redeemed or redemption-ready settles as a redemption; everything else
/// settles as a renewal.
pub fn plan_combined(tickets: &TicketSet) -> SettlementPlan {
    let mut plan = SettlementPlan {
        renewals: Vec::new(),
        redemptions: Vec::new(),
    };

    for ticket in tickets.iter() {
        if ticket.status.settles_as_redemption() {
            plan.redemptions.push(ticket.clone());
        } else {
            plan.renewals.push(ticket.clone());
        }
    }

    plan
}

/// The net amount the authorization thresholds are evaluated against.
///
/// Prefers the remote calculation total when one is available; otherwise
/// derives it from the ticket snapshots so the gate still works before
/// calculation has run.
pub fn net_amount(
    operation: OperationType,
    tickets: &TicketSet,
    calculation: Option<&CalculationResult>,
) -> Decimal {
    match operation {
        OperationType::Combined => plan_combined(tickets).net_amount(),
        _ => {
            if let Some(calc) = calculation {
                return calc.total_amount;
            }
            match operation {
                OperationType::Renewal => tickets.iter().map(|t| t.renewal_amount()).sum(),
                OperationType::Redemption => tickets.iter().map(|t| t.redemption_amount()).sum(),
                // Lost-report fees are set by the back office only.
                OperationType::LostReport => Decimal::ZERO,
                OperationType::Combined => unreachable!(),
            }
        }
    }
}

/// Convert a successful commit result into immutable history records.
///
/// Single-operation commits produce one record under the lead ticket's
/// number. Combined commits produce one record per affected ticket, with
/// the back-office transaction id suffixed per record so each stays
/// individually addressable.
pub fn transactions_from_result(
    operation: OperationType,
    tickets: &TicketSet,
    result: &TransactionResult,
    committed_at: DateTime<Utc>,
) -> Vec<Transaction> {
    match operation {
        OperationType::Combined => {
            let plan = plan_combined(tickets);
            let mut records = Vec::new();
            let mut seq = 0;

            for ticket in &plan.renewals {
                seq += 1;
                records.push(Transaction::Renewal {
                    transaction_id: format!("{}-{}", result.transaction_id, seq),
                    ticket_no: ticket.ticket_no.clone(),
                    new_ticket_no: None,
                    amount: ticket.renewal_amount(),
                    receipts: result.receipts.clone(),
                    committed_at,
                });
            }
            for ticket in &plan.redemptions {
                seq += 1;
                records.push(Transaction::Redemption {
                    transaction_id: format!("{}-{}", result.transaction_id, seq),
                    ticket_no: ticket.ticket_no.clone(),
                    amount: ticket.principal,
                    receipts: result.receipts.clone(),
                    committed_at,
                });
            }

            records
        }
        _ => {
            let Some(lead) = tickets.iter().next() else {
                return Vec::new();
            };

            let record = match operation {
                OperationType::Renewal => Transaction::Renewal {
                    transaction_id: result.transaction_id.clone(),
                    ticket_no: lead.ticket_no.clone(),
                    new_ticket_no: result.new_tickets.first().cloned(),
                    amount: result.total_amount,
                    receipts: result.receipts.clone(),
                    committed_at,
                },
                OperationType::Redemption => Transaction::Redemption {
                    transaction_id: result.transaction_id.clone(),
                    ticket_no: lead.ticket_no.clone(),
                    amount: result.total_amount,
                    receipts: result.receipts.clone(),
                    committed_at,
                },
                OperationType::LostReport => Transaction::LostReport {
                    transaction_id: result.transaction_id.clone(),
                    ticket_no: lead.ticket_no.clone(),
                    amount: result.total_amount,
                    receipts: result.receipts.clone(),
                    committed_at,
                },
                OperationType::Combined => unreachable!(),
            };

            vec![record]
        }
    }
}
