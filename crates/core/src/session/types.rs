//! Session data types and the workflow state enum.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::service::{CalculationOutcome, TransactionResult, ValidationOutcome};
use crate::ticket::{TicketNo, TicketPatch, TicketSet};

/// How many real-time updates are retained per session for audit/replay.
pub const PENDING_UPDATE_CAP: usize = 20;

/// Well-known keys in the session error map.
///
/// The presence of any key blocks forward progression; each key is cleared
/// only by its corresponding retry action.
pub mod error_keys {
    pub const VALIDATION: &str = "validation";
    pub const CALCULATION: &str = "calculation";
    pub const PROCESSING: &str = "processing";
    pub const AUTHORIZATION: &str = "authorization";
}

// ============================================================================
// Operation Type
// ============================================================================

/// The kind of counter operation a session settles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Extend a ticket's term by collecting accrued interest.
    Renewal,
    /// Close a ticket by collecting principal and interest.
    Redemption,
    /// File a lost-pledge report.
    LostReport,
    /// A netted batch of renewals and redemptions.
    Combined,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Renewal => "renewal",
            OperationType::Redemption => "redemption",
            OperationType::LostReport => "lost_report",
            OperationType::Combined => "combined",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Workflow State
// ============================================================================

/// Workflow state machine position.
///
/// ```text
/// idle -> ticket-entry -> ticket-validation -> review -> payment-entry
///      -> payment-validation -> staff-auth -> processing -> confirmation
///      -> complete
///
/// Any non-terminal state can divert to failed (processor error) or
/// cancelled (explicit user cancellation); both are terminal.
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowState {
    Idle,
    TicketEntry,
    TicketValidation,
    Review,
    PaymentEntry,
    PaymentValidation,
    StaffAuth,
    Processing,
    Confirmation,
    Complete,
    Failed,
    Cancelled,
}

impl WorkflowState {
    /// True for states with no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Complete | WorkflowState::Failed | WorkflowState::Cancelled
        )
    }

    /// The state reached by a successful `advance()` from here, if any.
    pub fn next(&self) -> Option<WorkflowState> {
        match self {
            WorkflowState::TicketEntry => Some(WorkflowState::TicketValidation),
            WorkflowState::TicketValidation => Some(WorkflowState::Review),
            WorkflowState::Review => Some(WorkflowState::PaymentEntry),
            WorkflowState::PaymentEntry => Some(WorkflowState::PaymentValidation),
            WorkflowState::PaymentValidation => Some(WorkflowState::StaffAuth),
            WorkflowState::StaffAuth => Some(WorkflowState::Processing),
            WorkflowState::Processing => Some(WorkflowState::Confirmation),
            WorkflowState::Confirmation => Some(WorkflowState::Complete),
            _ => None,
        }
    }

    /// The state `go_to_previous_step()` retreats to, if any.
    ///
    /// Retreat only covers the correction states; once processing has been
    /// dispatched there is nothing to go back to.
    pub fn previous(&self) -> Option<WorkflowState> {
        match self {
            WorkflowState::TicketValidation => Some(WorkflowState::TicketEntry),
            WorkflowState::Review => Some(WorkflowState::TicketValidation),
            WorkflowState::PaymentEntry => Some(WorkflowState::Review),
            WorkflowState::PaymentValidation => Some(WorkflowState::PaymentEntry),
            WorkflowState::StaffAuth => Some(WorkflowState::PaymentValidation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::TicketEntry => "ticket-entry",
            WorkflowState::TicketValidation => "ticket-validation",
            WorkflowState::Review => "review",
            WorkflowState::PaymentEntry => "payment-entry",
            WorkflowState::PaymentValidation => "payment-validation",
            WorkflowState::StaffAuth => "staff-auth",
            WorkflowState::Processing => "processing",
            WorkflowState::Confirmation => "confirmation",
            WorkflowState::Complete => "complete",
            WorkflowState::Failed => "failed",
            WorkflowState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Payment and Staff
// ============================================================================

/// Money collected from (or owed to) the customer for a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRecord {
    /// Cash tendered.
    pub cash_amount: Decimal,
    /// Amount paid by digital transfer.
    #[serde(default)]
    pub digital_amount: Decimal,
    /// External payment reference (transfer id, cheque number).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl PaymentRecord {
    /// Cash-only payment.
    pub fn cash(amount: Decimal) -> Self {
        Self {
            cash_amount: amount,
            digital_amount: Decimal::ZERO,
            reference: None,
        }
    }

    /// Total collected across tender types.
    pub fn total_collected(&self) -> Decimal {
        self.cash_amount + self.digital_amount
    }
}

/// Resolved staff profile attached to a credential after lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaffProfile {
    pub name: String,
    /// Managers may approve high-value settlements.
    pub is_manager: bool,
}

/// A staff code plus PIN entered to authorize the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaffCredential {
    pub staff_code: String,
    /// PIN is held only for the commit call; never logged or audited.
    pub pin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<StaffProfile>,
}

impl StaffCredential {
    pub fn new(staff_code: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            staff_code: staff_code.into(),
            pin: pin.into(),
            profile: None,
        }
    }

    pub fn with_profile(mut self, name: impl Into<String>, is_manager: bool) -> Self {
        self.profile = Some(StaffProfile {
            name: name.into(),
            is_manager,
        });
        self
    }

    pub fn is_manager(&self) -> bool {
        self.profile.as_ref().is_some_and(|p| p.is_manager)
    }
}

// ============================================================================
// Real-time audit entry
// ============================================================================

/// A real-time pushed change retained for audit/replay, distinct from the
/// ticket snapshot it mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingUpdate {
    pub ticket_no: TicketNo,
    pub fields: TicketPatch,
    pub received_at: DateTime<Utc>,
}

// ============================================================================
// Transaction Session
// ============================================================================

/// The single active transaction session at a terminal.
///
/// Owned exclusively by the [`SessionStore`](super::SessionStore) for its
/// lifetime; all mutation goes through the store's critical section so
/// user actions and real-time pushes cannot tear each other's writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionSession {
    /// Session identity (uuid); used to fence late network resolutions.
    pub id: String,
    pub operation: OperationType,
    pub state: WorkflowState,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every mutation; idle-timeout policy is the caller's.
    pub last_activity: DateTime<Utc>,
    /// Ticket snapshots, deduplicated by ticket number.
    pub tickets: TicketSet,
    pub payment: Option<PaymentRecord>,
    pub staff_auth: Vec<StaffCredential>,
    /// Last validation outcome, keyed to the revision it was computed at.
    pub validation: Option<ValidationOutcome>,
    /// Last calculation outcome, keyed to the revision it was computed at.
    pub calculation: Option<CalculationOutcome>,
    /// Commit result, populated when processing succeeds.
    pub result: Option<TransactionResult>,
    /// Named error map; any entry blocks forward progression.
    pub errors: BTreeMap<String, String>,
    /// Monotonically increasing ticket-set revision for staleness fencing.
    pub revision: u64,
    /// Ring buffer of applied real-time updates (cap 20).
    pub pending_updates: VecDeque<PendingUpdate>,
    /// Workflow state to restore on resume, set while paused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_state: Option<WorkflowState>,
}

impl TransactionSession {
    /// Fresh session in `ticket-entry` with empty collections.
    pub fn new(operation: OperationType) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation,
            state: WorkflowState::TicketEntry,
            created_at: now,
            last_activity: now,
            tickets: TicketSet::new(),
            payment: None,
            staff_auth: Vec::new(),
            validation: None,
            calculation: None,
            result: None,
            errors: BTreeMap::new(),
            revision: 0,
            pending_updates: VecDeque::new(),
            resume_state: None,
        }
    }

    /// Refresh the activity timestamp. Called by every store mutation.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Bump the ticket-set revision after a successful ticket mutation.
    pub fn bump_revision(&mut self) {
        self.revision += 1;
    }

    pub fn set_error(&mut self, key: &str, message: impl Into<String>) {
        self.errors.insert(key.to_string(), message.into());
    }

    pub fn clear_error(&mut self, key: &str) {
        self.errors.remove(key);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// True when the stored validation outcome matches the current
    /// ticket-set revision.
    pub fn validation_is_current(&self) -> bool {
        self.validation
            .as_ref()
            .is_some_and(|v| v.revision == self.revision)
    }

    /// True when the stored calculation outcome matches the current
    /// ticket-set revision.
    pub fn calculation_is_current(&self) -> bool {
        self.calculation
            .as_ref()
            .is_some_and(|c| c.revision == self.revision)
    }

    /// Record an applied real-time update, evicting the oldest past the cap.
    pub fn record_pending_update(&mut self, update: PendingUpdate) {
        if self.pending_updates.len() == PENDING_UPDATE_CAP {
            self.pending_updates.pop_front();
        }
        self.pending_updates.push_back(update);
    }

    /// Whether the session has sat idle longer than the configured timeout.
    /// Policy only; nothing in the store acts on this.
    pub fn is_abandoned(&self, now: DateTime<Utc>, idle_timeout_secs: u64) -> bool {
        now - self.last_activity > chrono::Duration::seconds(idle_timeout_secs as i64)
    }
}
