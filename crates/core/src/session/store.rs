//! The session store: owns the single active transaction session.

use thiserror::Error;
use tokio::sync::RwLock;

use super::{OperationType, TransactionSession, WorkflowState};

/// Error type for session lifecycle operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// A session is already active; end it explicitly before starting
    /// another.
    #[error("a session is already active ({0}); end it before starting a new one")]
    AlreadyActive(String),

    /// No session is active.
    #[error("no active session")]
    NoActiveSession,

    /// Resume called while the session is not paused.
    #[error("session is not paused")]
    NotPaused,

    /// The session is in a terminal state and cannot be paused.
    #[error("session is in terminal state {0}")]
    Terminal(String),
}

/// Holds the single active [`TransactionSession`] behind one lock.
///
/// The write guard is the critical section shared by user-driven mutations
/// and real-time pushes: ticket set, payment, and credentials are only ever
/// changed inside [`SessionStore::with_session_mut`], so a concurrently
/// running validation snapshot never observes a torn session.
pub struct SessionStore {
    inner: RwLock<Option<TransactionSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Start a fresh session. Fails when one is already active; the caller
    /// must end the prior session explicitly.
    pub async fn start(&self, operation: OperationType) -> Result<TransactionSession, SessionError> {
        let mut guard = self.inner.write().await;
        if let Some(existing) = guard.as_ref() {
            return Err(SessionError::AlreadyActive(existing.id.clone()));
        }
        let session = TransactionSession::new(operation);
        *guard = Some(session.clone());
        Ok(session)
    }

    /// Discard all in-memory session data. Always succeeds; persisted
    /// transaction history is untouched. Returns the discarded session.
    pub async fn end(&self) -> Option<TransactionSession> {
        self.inner.write().await.take()
    }

    /// Replace the active session with a fresh one of the same operation
    /// type, wiping tickets, payment, credentials, and all error state.
    pub async fn reset(&self) -> Result<TransactionSession, SessionError> {
        let mut guard = self.inner.write().await;
        let operation = guard
            .as_ref()
            .map(|s| s.operation)
            .ok_or(SessionError::NoActiveSession)?;
        let session = TransactionSession::new(operation);
        *guard = Some(session.clone());
        Ok(session)
    }

    /// Park the session in `idle` without discarding data, remembering the
    /// state to restore on resume.
    pub async fn pause(&self) -> Result<WorkflowState, SessionError> {
        let mut guard = self.inner.write().await;
        let session = guard.as_mut().ok_or(SessionError::NoActiveSession)?;
        if session.state.is_terminal() {
            return Err(SessionError::Terminal(session.state.to_string()));
        }
        if session.state != WorkflowState::Idle {
            session.resume_state = Some(session.state);
            session.state = WorkflowState::Idle;
            session.touch();
        }
        Ok(session.state)
    }

    /// Restore the workflow state recorded by [`SessionStore::pause`].
    pub async fn resume(&self) -> Result<WorkflowState, SessionError> {
        let mut guard = self.inner.write().await;
        let session = guard.as_mut().ok_or(SessionError::NoActiveSession)?;
        let restored = session.resume_state.take().ok_or(SessionError::NotPaused)?;
        session.state = restored;
        session.touch();
        Ok(restored)
    }

    /// Clone of the active session, if any.
    pub async fn snapshot(&self) -> Option<TransactionSession> {
        self.inner.read().await.clone()
    }

    /// Identity of the active session, if any. Used to fence network
    /// resolutions that outlive the session they were issued for.
    pub async fn active_id(&self) -> Option<String> {
        self.inner.read().await.as_ref().map(|s| s.id.clone())
    }

    /// Run a closure against the active session under the read lock.
    pub async fn with_session<R>(
        &self,
        f: impl FnOnce(&TransactionSession) -> R,
    ) -> Result<R, SessionError> {
        let guard = self.inner.read().await;
        let session = guard.as_ref().ok_or(SessionError::NoActiveSession)?;
        Ok(f(session))
    }

    /// Run a mutation against the active session inside the critical
    /// section. Refreshes `last_activity` after the closure runs.
    pub async fn with_session_mut<R>(
        &self,
        f: impl FnOnce(&mut TransactionSession) -> R,
    ) -> Result<R, SessionError> {
        let mut guard = self.inner.write().await;
        let session = guard.as_mut().ok_or(SessionError::NoActiveSession)?;
        let result = f(session);
        session.touch();
        Ok(result)
    }

    /// Like [`SessionStore::with_session_mut`] but only applies when the
    /// session identity still matches. Returns `Ok(None)` when the session
    /// is gone or was replaced; late network resolutions use this to become
    /// no-ops instead of corrupting an unrelated session.
    pub async fn with_matching_session_mut<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut TransactionSession) -> R,
    ) -> Option<R> {
        let mut guard = self.inner.write().await;
        let session = guard.as_mut().filter(|s| s.id == session_id)?;
        let result = f(session);
        session.touch();
        Some(result)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
