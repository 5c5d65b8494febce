use std::sync::Arc;

use tokio::sync::mpsc;

use pledgedesk_core::audit::AuditStore;
use pledgedesk_core::history::HistoryStore;
use pledgedesk_core::{Config, PushEvent, SanitizedConfig, WorkflowEngine};

/// Shared application state
pub struct AppState {
    config: Config,
    engine: Arc<WorkflowEngine>,
    audit_store: Arc<dyn AuditStore>,
    history_store: Arc<dyn HistoryStore>,
    /// Inbound push channel feeding the update listener.
    push_tx: mpsc::Sender<PushEvent>,
}

impl AppState {
    pub fn new(
        config: Config,
        engine: Arc<WorkflowEngine>,
        audit_store: Arc<dyn AuditStore>,
        history_store: Arc<dyn HistoryStore>,
        push_tx: mpsc::Sender<PushEvent>,
    ) -> Self {
        Self {
            config,
            engine,
            audit_store,
            history_store,
            push_tx,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }

    pub fn history_store(&self) -> &dyn HistoryStore {
        self.history_store.as_ref()
    }

    pub fn push_sender(&self) -> mpsc::Sender<PushEvent> {
        self.push_tx.clone()
    }
}
