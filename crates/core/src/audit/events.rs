use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Session lifecycle
    SessionStarted {
        session_id: String,
        operation: String,
    },
    SessionEnded {
        session_id: String,
        final_state: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    StateChanged {
        session_id: String,
        from_state: String,
        to_state: String,
    },

    // Ticket set mutations
    TicketAdded {
        session_id: String,
        ticket_no: String,
    },
    TicketRemoved {
        session_id: String,
        ticket_no: String,
    },
    TicketsCleared {
        session_id: String,
        /// How many tickets were dropped.
        count: usize,
    },

    // Staff authorization
    StaffAuthAdded {
        session_id: String,
        staff_code: String,
        is_manager: bool,
    },
    StaffAuthRemoved {
        session_id: String,
        staff_code: String,
    },
    AuthorizationRejected {
        session_id: String,
        reason: String,
    },

    // Pipeline
    ValidationCompleted {
        session_id: String,
        is_valid: bool,
        error_count: usize,
        duration_ms: u64,
    },
    CalculationCompleted {
        session_id: String,
        total_amount: Decimal,
        duration_ms: u64,
    },

    // Commit outcomes
    TransactionCommitted {
        session_id: String,
        transaction_id: String,
        operation: String,
        total_amount: Decimal,
    },
    ProcessingFailed {
        session_id: String,
        operation: String,
        error: String,
    },

    // Real-time pushes
    RealtimeUpdateApplied {
        session_id: String,
        ticket_no: String,
    },
    RealtimeUpdateIgnored {
        ticket_no: String,
    },
}

impl AuditEvent {
    /// Event type as a string (matches the serde tag).
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::ServiceStarted { .. } => "service_started",
            AuditEvent::ServiceStopped { .. } => "service_stopped",
            AuditEvent::SessionStarted { .. } => "session_started",
            AuditEvent::SessionEnded { .. } => "session_ended",
            AuditEvent::StateChanged { .. } => "state_changed",
            AuditEvent::TicketAdded { .. } => "ticket_added",
            AuditEvent::TicketRemoved { .. } => "ticket_removed",
            AuditEvent::TicketsCleared { .. } => "tickets_cleared",
            AuditEvent::StaffAuthAdded { .. } => "staff_auth_added",
            AuditEvent::StaffAuthRemoved { .. } => "staff_auth_removed",
            AuditEvent::AuthorizationRejected { .. } => "authorization_rejected",
            AuditEvent::ValidationCompleted { .. } => "validation_completed",
            AuditEvent::CalculationCompleted { .. } => "calculation_completed",
            AuditEvent::TransactionCommitted { .. } => "transaction_committed",
            AuditEvent::ProcessingFailed { .. } => "processing_failed",
            AuditEvent::RealtimeUpdateApplied { .. } => "realtime_update_applied",
            AuditEvent::RealtimeUpdateIgnored { .. } => "realtime_update_ignored",
        }
    }

    /// Session this event belongs to, if any.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            AuditEvent::SessionStarted { session_id, .. }
            | AuditEvent::SessionEnded { session_id, .. }
            | AuditEvent::StateChanged { session_id, .. }
            | AuditEvent::TicketAdded { session_id, .. }
            | AuditEvent::TicketRemoved { session_id, .. }
            | AuditEvent::TicketsCleared { session_id, .. }
            | AuditEvent::StaffAuthAdded { session_id, .. }
            | AuditEvent::StaffAuthRemoved { session_id, .. }
            | AuditEvent::AuthorizationRejected { session_id, .. }
            | AuditEvent::ValidationCompleted { session_id, .. }
            | AuditEvent::CalculationCompleted { session_id, .. }
            | AuditEvent::TransactionCommitted { session_id, .. }
            | AuditEvent::ProcessingFailed { session_id, .. }
            | AuditEvent::RealtimeUpdateApplied { session_id, .. } => Some(session_id),
            AuditEvent::ServiceStarted { .. }
            | AuditEvent::ServiceStopped { .. }
            | AuditEvent::RealtimeUpdateIgnored { .. } => None,
        }
    }

    /// Pawn ticket number this event concerns, if any.
    pub fn ticket_no(&self) -> Option<&str> {
        match self {
            AuditEvent::TicketAdded { ticket_no, .. }
            | AuditEvent::TicketRemoved { ticket_no, .. }
            | AuditEvent::RealtimeUpdateApplied { ticket_no, .. }
            | AuditEvent::RealtimeUpdateIgnored { ticket_no } => Some(ticket_no),
            _ => None,
        }
    }
}

/// A stored audit record with its assigned id and extracted index columns.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub session_id: Option<String>,
    pub ticket_no: Option<String>,
    pub data: AuditEvent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_event_type_matches_serde_tag() {
        let event = AuditEvent::TransactionCommitted {
            session_id: "s-1".to_string(),
            transaction_id: "T100".to_string(),
            operation: "renewal".to_string(),
            total_amount: dec!(36),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(&format!("\"type\":\"{}\"", event.event_type())));
    }

    #[test]
    fn test_session_and_ticket_extraction() {
        let event = AuditEvent::TicketAdded {
            session_id: "s-1".to_string(),
            ticket_no: "B/0725/1234".to_string(),
        };
        assert_eq!(event.session_id(), Some("s-1"));
        assert_eq!(event.ticket_no(), Some("B/0725/1234"));

        let event = AuditEvent::ServiceStopped {
            reason: "shutdown".to_string(),
        };
        assert_eq!(event.session_id(), None);
        assert_eq!(event.ticket_no(), None);
    }

    #[test]
    fn test_round_trip() {
        let event = AuditEvent::ValidationCompleted {
            session_id: "s-1".to_string(),
            is_valid: false,
            error_count: 2,
            duration_ms: 140,
        };

        let json = serde_json::to_string(&event).unwrap();
        let back: AuditEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            AuditEvent::ValidationCompleted {
                error_count: 2,
                is_valid: false,
                ..
            }
        ));
    }
}
