//! Pawn ticket types and the session ticket set.

mod set;
mod types;

pub use set::TicketSet;
pub use types::{TicketNo, TicketNoParseError, TicketPatch, TicketRef, TicketStatus};
