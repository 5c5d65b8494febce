//! SQLite-backed transaction history log.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::{HistoryError, HistoryFilter, HistoryStore, Transaction};

/// SQLite-backed history store. Records are stored as JSON alongside the
/// columns used for filtering.
pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    /// Open (or create) the history database at the given path.
    pub fn new(path: &Path) -> Result<Self, HistoryError> {
        let conn = Connection::open(path).map_err(|e| HistoryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory history store (useful for testing).
    pub fn in_memory() -> Result<Self, HistoryError> {
        let conn =
            Connection::open_in_memory().map_err(|e| HistoryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), HistoryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                transaction_id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                ticket_no TEXT NOT NULL,
                amount TEXT NOT NULL,
                committed_at TEXT NOT NULL,
                record TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_ticket_no ON transactions(ticket_no);
            CREATE INDEX IF NOT EXISTS idx_transactions_committed_at ON transactions(committed_at);
            "#,
        )
        .map_err(|e| HistoryError::Database(e.to_string()))?;

        Ok(())
    }

    fn build_where_clause(filter: &HistoryFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref ticket_no) = filter.ticket_no {
            conditions.push("ticket_no = ?");
            params.push(Box::new(ticket_no.clone()));
        }

        if let Some(ref kind) = filter.kind {
            conditions.push("kind = ?");
            params.push(Box::new(kind.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let record_json: String = row.get(0)?;
        serde_json::from_str(&record_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn append(&self, transaction: &Transaction) -> Result<(), HistoryError> {
        let conn = self.conn.lock().unwrap();

        let record_json = serde_json::to_string(transaction)
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        conn.execute(
            "INSERT OR REPLACE INTO transactions (transaction_id, kind, ticket_no, amount, committed_at, record) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                transaction.transaction_id(),
                transaction.kind(),
                transaction.ticket_no().to_string(),
                transaction.amount().to_string(),
                transaction.committed_at().to_rfc3339(),
                record_json,
            ],
        )
        .map_err(|e| HistoryError::Database(e.to_string()))?;

        Ok(())
    }

    fn list(&self, filter: &HistoryFilter) -> Result<Vec<Transaction>, HistoryError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT record FROM transactions {} ORDER BY committed_at DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_transaction)
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        let mut transactions = Vec::new();
        for row_result in rows {
            let tx = row_result.map_err(|e| HistoryError::Database(e.to_string()))?;
            transactions.push(tx);
        }

        Ok(transactions)
    }

    fn find(&self, transaction_id: &str) -> Result<Option<Transaction>, HistoryError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            "SELECT record FROM transactions WHERE transaction_id = ?",
            params![transaction_id],
            Self::row_to_transaction,
        );

        match result {
            Ok(tx) => Ok(Some(tx)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(HistoryError::Database(e.to_string())),
        }
    }

    fn count(&self, filter: &HistoryFilter) -> Result<i64, HistoryError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM transactions {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn
            .query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| HistoryError::Database(e.to_string()))?;

        Ok(count)
    }
}
