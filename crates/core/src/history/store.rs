//! History storage: the durable store trait and the in-memory recent ring.

use std::collections::VecDeque;

use thiserror::Error;

use super::Transaction;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Filter for querying the durable history log.
#[derive(Debug, Clone)]
pub struct HistoryFilter {
    /// Match records for a specific pawn ticket number.
    pub ticket_no: Option<String>,
    /// Match records of a specific kind ("renewal", "redemption", "lost_report").
    pub kind: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl HistoryFilter {
    pub fn new() -> Self {
        Self {
            ticket_no: None,
            kind: None,
            limit: 50,
            offset: 0,
        }
    }

    pub fn with_ticket_no(mut self, ticket_no: impl Into<String>) -> Self {
        self.ticket_no = Some(ticket_no.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Durable transaction log. Append-only; records are never updated.
pub trait HistoryStore: Send + Sync {
    /// Append a committed transaction record.
    fn append(&self, transaction: &Transaction) -> Result<(), HistoryError>;

    /// List records matching the filter, most recent first.
    fn list(&self, filter: &HistoryFilter) -> Result<Vec<Transaction>, HistoryError>;

    /// Look up a record by its back-office transaction id.
    fn find(&self, transaction_id: &str) -> Result<Option<Transaction>, HistoryError>;

    /// Total record count matching the filter.
    fn count(&self, filter: &HistoryFilter) -> Result<i64, HistoryError>;
}

/// Bounded in-memory ring of the most recent transactions, newest first.
///
/// Serves receipt-reprint lookups without a database round trip. Capacity
/// is small (default 10); older records live only in the durable store.
#[derive(Debug, Clone)]
pub struct RecentHistory {
    entries: VecDeque<Transaction>,
    cap: usize,
}

impl RecentHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Record a committed transaction, evicting the oldest past capacity.
    pub fn record(&mut self, transaction: Transaction) {
        if self.cap == 0 {
            return;
        }
        if self.entries.len() == self.cap {
            self.entries.pop_back();
        }
        self.entries.push_front(transaction);
    }

    /// Seed the ring from durable records, given most recent first.
    pub fn restore(&mut self, transactions: impl IntoIterator<Item = Transaction>) {
        for tx in transactions.into_iter().take(self.cap) {
            self.entries.push_back(tx);
        }
    }

    /// Most recent first.
    pub fn recent(&self) -> Vec<Transaction> {
        self.entries.iter().cloned().collect()
    }

    pub fn find(&self, transaction_id: &str) -> Option<&Transaction> {
        self.entries
            .iter()
            .find(|tx| tx.transaction_id() == transaction_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
