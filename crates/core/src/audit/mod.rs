//! Branch audit trail.
//!
//! Every operator-visible action (session lifecycle, ticket mutations,
//! staff sign-offs, commits) is emitted as an [`AuditEvent`] through a
//! cheap cloneable [`AuditHandle`] and written to durable storage by a
//! background [`AuditWriter`].

mod events;
mod handle;
mod sqlite;
mod store;
mod writer;

pub use events::*;
pub use handle::*;
pub use sqlite::*;
pub use store::*;
pub use writer::*;
