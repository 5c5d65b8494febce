//! Core library for the pawnshop counter workflow service.
//!
//! Orchestrates the single active transaction session at a terminal:
//! the workflow state machine, ticket-set and payment management, the
//! staff-authorization gate, remote validation/calculation/commit calls
//! to the back-office gateway, real-time pushed ticket updates, and the
//! durable transaction history and audit logs.

pub mod audit;
pub mod authorize;
pub mod config;
pub mod history;
pub mod metrics;
pub mod processor;
pub mod realtime;
pub mod service;
pub mod session;
pub mod testing;
pub mod ticket;
pub mod workflow;

pub use audit::{
    create_audit_system, AuditEvent, AuditFilter, AuditHandle, AuditRecord, AuditStore,
    SqliteAuditStore,
};
pub use authorize::{AuthPolicy, AuthorizationError};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig};
pub use history::{HistoryFilter, HistoryStore, RecentHistory, SqliteHistoryStore, Transaction};
pub use realtime::{ApplyOutcome, PushEvent, UpdateListener};
pub use service::{CalculationService, CommitService, HttpBackOfficeClient, ServiceError};
pub use session::{OperationType, PaymentRecord, StaffCredential, TransactionSession, WorkflowState};
pub use ticket::{TicketNo, TicketPatch, TicketRef, TicketSet, TicketStatus};
pub use workflow::{EngineStatus, WorkflowEngine, WorkflowError};
