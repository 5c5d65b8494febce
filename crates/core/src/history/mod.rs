//! Completed-transaction history.
//!
//! Two layers: a small in-memory ring of the most recent transactions for
//! instant receipt reprint lookups, and a durable SQLite log that survives
//! terminal restarts.

mod sqlite;
mod store;
mod types;

pub use sqlite::SqliteHistoryStore;
pub use store::{HistoryError, HistoryFilter, HistoryStore, RecentHistory};
pub use types::Transaction;
