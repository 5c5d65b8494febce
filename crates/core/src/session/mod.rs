//! Transaction session: the single unit of in-flight work at a terminal.

mod store;
mod types;

pub use store::{SessionError, SessionStore};
pub use types::{
    error_keys, OperationType, PaymentRecord, PendingUpdate, StaffCredential, StaffProfile,
    TransactionSession, WorkflowState, PENDING_UPDATE_CAP,
};
