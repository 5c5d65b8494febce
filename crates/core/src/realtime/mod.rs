//! Real-time update integration.
//!
//! The back office pushes ticket changes (another terminal renewing the
//! same customer's ticket, a status flip after an expiry sweep) while a
//! session is open. The listener forwards each push into the workflow
//! engine, which merges it into the active session's ticket set only if
//! that ticket is actually part of the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::ticket::{TicketNo, TicketPatch};
use crate::workflow::WorkflowEngine;

/// Events delivered over the push channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    /// A ticket changed server-side; `fields` carries only the changed fields.
    TicketUpdate {
        ticket_no: TicketNo,
        fields: TicketPatch,
    },
    /// A transaction committed at another terminal.
    TransactionCompleted { transaction_id: String },
}

/// What happened when a pushed ticket update met the active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The ticket is in the active session and its snapshot was merged.
    Applied,
    /// There is an active session but it does not hold this ticket.
    NotInSession,
    /// No session is active; the update is dropped.
    NoSession,
}

/// Background task that drains the push channel into the engine.
pub struct UpdateListener {
    engine: Arc<WorkflowEngine>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl UpdateListener {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            engine,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start draining the given push channel (spawns a background task).
    pub fn start(&self, mut events: mpsc::Receiver<PushEvent>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Update listener already running");
            return;
        }

        let engine = Arc::clone(&self.engine);
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Update listener started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Update listener received shutdown signal");
                        break;
                    }
                    event = events.recv() => {
                        let Some(event) = event else {
                            info!("Push channel closed");
                            break;
                        };
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        Self::handle_event(&engine, event).await;
                    }
                }
            }
            running.store(false, Ordering::SeqCst);
            info!("Update listener stopped");
        });
    }

    async fn handle_event(engine: &WorkflowEngine, event: PushEvent) {
        match event {
            PushEvent::TicketUpdate { ticket_no, fields } => {
                let outcome = engine.apply_ticket_update(&ticket_no, fields).await;
                match outcome {
                    ApplyOutcome::Applied => {
                        debug!(ticket_no = %ticket_no, "Applied pushed ticket update");
                    }
                    ApplyOutcome::NotInSession => {
                        debug!(ticket_no = %ticket_no, "Pushed update for ticket not in session, ignored");
                    }
                    ApplyOutcome::NoSession => {
                        debug!(ticket_no = %ticket_no, "Pushed update with no active session, dropped");
                    }
                }
            }
            PushEvent::TransactionCompleted { transaction_id } => {
                debug!(
                    transaction_id = %transaction_id,
                    "Transaction completed at another terminal"
                );
            }
        }
    }

    /// Stop the listener gracefully.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}
