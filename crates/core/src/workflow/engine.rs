//! The workflow engine: the single entry point for everything a counter
//! terminal does to the active transaction session.
//!
//! The engine owns the session store, the remote service clients, the
//! authorization policy, and the recent-transaction ring. Every
//! network-backed step follows the same shape: snapshot the session,
//! release the lock, await the remote call, then re-apply the result
//! through the store's identity fence so a session that ended or was
//! replaced mid-flight is never touched.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::authorize::{AuthPolicy, AuthorizationError};
use crate::config::SessionConfig;
use crate::history::{HistoryFilter, HistoryStore, RecentHistory, Transaction};
use crate::metrics;
use crate::processor;
use crate::realtime::ApplyOutcome;
use crate::service::{
    CalculationOutcome, CalculationResult, CalculationService, CommitRequest, CommitService,
    ValidationOutcome, ValidationResult,
};
use crate::session::{
    error_keys, OperationType, PaymentRecord, PendingUpdate, SessionError, SessionStore,
    StaffCredential, TransactionSession, WorkflowState,
};
use crate::ticket::{TicketNo, TicketPatch, TicketRef};

use super::WorkflowError;

/// Compact status view for the UI and the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub session_active: bool,
    pub session_id: Option<String>,
    pub operation: Option<OperationType>,
    pub state: Option<WorkflowState>,
    pub ticket_count: usize,
    pub errors: BTreeMap<String, String>,
    pub can_proceed: bool,
    /// A network-backed step is currently in flight.
    pub processing: bool,
}

/// Holds the advancing flag for the duration of one network-backed step.
/// A second caller gets `OperationInProgress` instead of queuing behind it.
struct AdvanceGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> AdvanceGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, WorkflowError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| WorkflowError::OperationInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for AdvanceGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

fn auth_reason_label(error: &AuthorizationError) -> &'static str {
    match error {
        AuthorizationError::NoCredentials => "no_credentials",
        AuthorizationError::DuplicateStaffCode(_) => "duplicate_code",
        AuthorizationError::DualStaffRequired => "dual_staff",
        AuthorizationError::ManagerApprovalRequired => "manager_approval",
    }
}

pub struct WorkflowEngine {
    policy: AuthPolicy,
    session_cfg: SessionConfig,
    calc: Arc<dyn CalculationService>,
    commit: Arc<dyn CommitService>,
    history_store: Arc<dyn HistoryStore>,
    audit: Option<AuditHandle>,
    sessions: SessionStore,
    recent: RwLock<RecentHistory>,
    advancing: AtomicBool,
}

impl WorkflowEngine {
    pub fn new(
        policy: AuthPolicy,
        session_cfg: SessionConfig,
        calc: Arc<dyn CalculationService>,
        commit: Arc<dyn CommitService>,
        history_store: Arc<dyn HistoryStore>,
    ) -> Self {
        let recent = RwLock::new(RecentHistory::new(session_cfg.recent_history_cap));
        Self {
            policy,
            session_cfg,
            calc,
            commit,
            history_store,
            audit: None,
            sessions: SessionStore::new(),
            recent,
            advancing: AtomicBool::new(false),
        }
    }

    /// Attach an audit handle; events are emitted best-effort.
    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    async fn audit(&self, event: AuditEvent) {
        if let Some(handle) = &self.audit {
            handle.emit(event).await;
        }
    }

    async fn record_transition(&self, session_id: &str, from: WorkflowState, to: WorkflowState) {
        metrics::STATE_TRANSITIONS
            .with_label_values(&[from.as_str(), to.as_str()])
            .inc();
        debug!(session_id, from = %from, to = %to, "Workflow state changed");
        self.audit(AuditEvent::StateChanged {
            session_id: session_id.to_string(),
            from_state: from.to_string(),
            to_state: to.to_string(),
        })
        .await;
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Start a fresh session. Fails when one is already active.
    pub async fn start_session(
        &self,
        operation: OperationType,
    ) -> Result<TransactionSession, WorkflowError> {
        let session = self.sessions.start(operation).await?;
        metrics::SESSIONS_STARTED
            .with_label_values(&[operation.as_str()])
            .inc();
        info!(session_id = %session.id, operation = %operation, "Session started");
        self.audit(AuditEvent::SessionStarted {
            session_id: session.id.clone(),
            operation: operation.to_string(),
        })
        .await;
        Ok(session)
    }

    /// Discard the active session. In-progress data is gone for good;
    /// committed history is untouched.
    pub async fn end_session(&self, reason: Option<String>) -> Option<TransactionSession> {
        let ended = self.sessions.end().await?;

        let final_label = if ended.state.is_terminal() {
            ended.state.as_str()
        } else {
            "abandoned"
        };
        metrics::SESSIONS_ENDED.with_label_values(&[final_label]).inc();
        let duration = (Utc::now() - ended.created_at).num_milliseconds().max(0) as f64 / 1000.0;
        metrics::SESSION_DURATION
            .with_label_values(&[final_label])
            .observe(duration);

        info!(session_id = %ended.id, final_state = %ended.state, "Session ended");
        self.audit(AuditEvent::SessionEnded {
            session_id: ended.id.clone(),
            final_state: ended.state.to_string(),
            reason,
        })
        .await;
        Some(ended)
    }

    /// Mark the session cancelled and discard it.
    pub async fn cancel_session(&self) -> Result<TransactionSession, WorkflowError> {
        let (id, from) = self
            .sessions
            .with_session_mut(|s| {
                let from = s.state;
                if !s.state.is_terminal() {
                    s.state = WorkflowState::Cancelled;
                }
                (s.id.clone(), from)
            })
            .await?;
        if from != WorkflowState::Cancelled && !from.is_terminal() {
            self.record_transition(&id, from, WorkflowState::Cancelled).await;
        }
        self.end_session(Some("cancelled by staff".to_string()))
            .await
            .ok_or_else(|| SessionError::NoActiveSession.into())
    }

    /// Replace the active session with a fresh one of the same operation.
    pub async fn reset_session(&self) -> Result<TransactionSession, WorkflowError> {
        let fresh = self.sessions.reset().await?;
        info!(session_id = %fresh.id, "Session reset");
        Ok(fresh)
    }

    /// Park the session in `idle` without losing data.
    pub async fn pause_session(&self) -> Result<WorkflowState, WorkflowError> {
        Ok(self.sessions.pause().await?)
    }

    /// Restore the state recorded at pause.
    pub async fn resume_session(&self) -> Result<WorkflowState, WorkflowError> {
        Ok(self.sessions.resume().await?)
    }

    /// End the session if it has sat idle past the configured timeout.
    pub async fn sweep_abandoned(&self) -> Option<TransactionSession> {
        let idle_timeout = self.session_cfg.idle_timeout_secs;
        let abandoned = self
            .sessions
            .with_session(|s| s.is_abandoned(Utc::now(), idle_timeout))
            .await
            .unwrap_or(false);
        if !abandoned {
            return None;
        }
        warn!("Ending session abandoned past the idle timeout");
        self.end_session(Some("abandoned after idle timeout".to_string()))
            .await
    }

    /// Clone of the active session, if any.
    pub async fn session_snapshot(&self) -> Option<TransactionSession> {
        self.sessions.snapshot().await
    }

    // ------------------------------------------------------------------
    // Ticket set
    // ------------------------------------------------------------------

    fn guard_mutable(state: WorkflowState) -> Result<(), WorkflowError> {
        if state.is_terminal() {
            return Err(WorkflowError::TerminalState(state.to_string()));
        }
        if state == WorkflowState::Processing {
            return Err(WorkflowError::GuardFailed(
                "cannot modify the session while a commit is in flight".to_string(),
            ));
        }
        Ok(())
    }

    /// Add a ticket snapshot to the session. Idempotent by ticket number;
    /// returns false when the ticket was already present.
    pub async fn add_ticket(&self, ticket: TicketRef) -> Result<bool, WorkflowError> {
        let ticket_no = ticket.ticket_no.to_string();
        let (session_id, added) = self
            .sessions
            .with_session_mut(|s| {
                Self::guard_mutable(s.state)?;
                let added = s.tickets.add(ticket);
                if added {
                    s.bump_revision();
                }
                Ok::<_, WorkflowError>((s.id.clone(), added))
            })
            .await??;
        if added {
            self.audit(AuditEvent::TicketAdded {
                session_id,
                ticket_no,
            })
            .await;
        }
        Ok(added)
    }

    /// Remove a ticket by number, returning the removed snapshot.
    pub async fn remove_ticket(
        &self,
        ticket_no: &TicketNo,
    ) -> Result<Option<TicketRef>, WorkflowError> {
        let (session_id, removed) = self
            .sessions
            .with_session_mut(|s| {
                Self::guard_mutable(s.state)?;
                let removed = s.tickets.remove(ticket_no);
                if removed.is_some() {
                    s.bump_revision();
                }
                Ok::<_, WorkflowError>((s.id.clone(), removed))
            })
            .await??;
        if removed.is_some() {
            self.audit(AuditEvent::TicketRemoved {
                session_id,
                ticket_no: ticket_no.to_string(),
            })
            .await;
        }
        Ok(removed)
    }

    /// Merge a patch into a ticket already in the session.
    pub async fn update_ticket(
        &self,
        ticket_no: &TicketNo,
        patch: &TicketPatch,
    ) -> Result<bool, WorkflowError> {
        let changed = self
            .sessions
            .with_session_mut(|s| {
                Self::guard_mutable(s.state)?;
                let changed = s.tickets.update(ticket_no, patch);
                if changed {
                    s.bump_revision();
                }
                Ok::<_, WorkflowError>(changed)
            })
            .await??;
        Ok(changed)
    }

    /// Empty the ticket set, returning how many tickets were dropped.
    pub async fn clear_tickets(&self) -> Result<usize, WorkflowError> {
        let (session_id, count) = self
            .sessions
            .with_session_mut(|s| {
                Self::guard_mutable(s.state)?;
                let count = s.tickets.clear();
                if count > 0 {
                    s.bump_revision();
                }
                Ok::<_, WorkflowError>((s.id.clone(), count))
            })
            .await??;
        if count > 0 {
            self.audit(AuditEvent::TicketsCleared { session_id, count })
                .await;
        }
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Payment and staff authorization
    // ------------------------------------------------------------------

    pub async fn set_payment(&self, payment: PaymentRecord) -> Result<(), WorkflowError> {
        self.sessions
            .with_session_mut(|s| {
                Self::guard_mutable(s.state)?;
                s.payment = Some(payment);
                Ok::<_, WorkflowError>(())
            })
            .await??;
        Ok(())
    }

    /// Enter a staff credential. Rejects a staff code already entered;
    /// the dual-staff rule needs two distinct people.
    pub async fn add_staff_auth(&self, credential: StaffCredential) -> Result<(), WorkflowError> {
        let staff_code = credential.staff_code.clone();
        let is_manager = credential.is_manager();
        let session_id = self
            .sessions
            .with_session_mut(|s| {
                Self::guard_mutable(s.state)?;
                if s.staff_auth
                    .iter()
                    .any(|c| c.staff_code == credential.staff_code)
                {
                    return Err(WorkflowError::Authorization(
                        AuthorizationError::DuplicateStaffCode(credential.staff_code.clone()),
                    ));
                }
                s.staff_auth.push(credential);
                Ok(s.id.clone())
            })
            .await??;
        self.audit(AuditEvent::StaffAuthAdded {
            session_id,
            staff_code,
            is_manager,
        })
        .await;
        Ok(())
    }

    pub async fn remove_staff_auth(&self, staff_code: &str) -> Result<bool, WorkflowError> {
        let (session_id, removed) = self
            .sessions
            .with_session_mut(|s| {
                Self::guard_mutable(s.state)?;
                let before = s.staff_auth.len();
                s.staff_auth.retain(|c| c.staff_code != staff_code);
                Ok::<_, WorkflowError>((s.id.clone(), s.staff_auth.len() < before))
            })
            .await??;
        if removed {
            self.audit(AuditEvent::StaffAuthRemoved {
                session_id,
                staff_code: staff_code.to_string(),
            })
            .await;
        }
        Ok(removed)
    }

    pub async fn clear_staff_auth(&self) -> Result<(), WorkflowError> {
        self.sessions
            .with_session_mut(|s| {
                Self::guard_mutable(s.state)?;
                s.staff_auth.clear();
                Ok::<_, WorkflowError>(())
            })
            .await??;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Pipeline steps
    // ------------------------------------------------------------------

    /// Run remote validation against the current ticket set without
    /// advancing the workflow.
    pub async fn validate_tickets(&self) -> Result<ValidationResult, WorkflowError> {
        let _guard = AdvanceGuard::acquire(&self.advancing)?;
        let snapshot = self
            .sessions
            .snapshot()
            .await
            .ok_or(SessionError::NoActiveSession)?;
        if snapshot.tickets.is_empty() {
            return Err(WorkflowError::GuardFailed(
                "no tickets to validate".to_string(),
            ));
        }
        self.run_validation(&snapshot, false).await
    }

    /// Run remote calculation against the current ticket set without
    /// advancing the workflow.
    pub async fn calculate_totals(&self) -> Result<CalculationResult, WorkflowError> {
        let _guard = AdvanceGuard::acquire(&self.advancing)?;
        let snapshot = self
            .sessions
            .snapshot()
            .await
            .ok_or(SessionError::NoActiveSession)?;
        if snapshot.tickets.is_empty() {
            return Err(WorkflowError::GuardFailed(
                "no tickets to calculate".to_string(),
            ));
        }
        self.run_calculation(&snapshot, false).await
    }

    async fn run_validation(
        &self,
        snapshot: &TransactionSession,
        transition: bool,
    ) -> Result<ValidationResult, WorkflowError> {
        let tickets = snapshot.tickets.ticket_nos();
        let started = Instant::now();
        let outcome = self
            .calc
            .validate(snapshot.operation, &tickets, snapshot.payment.as_ref())
            .await;
        let elapsed = started.elapsed();
        metrics::VALIDATION_DURATION
            .with_label_values(&[])
            .observe(elapsed.as_secs_f64());
        let duration_ms = elapsed.as_millis() as u64;

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                metrics::VALIDATIONS_TOTAL.with_label_values(&["error"]).inc();
                warn!(session_id = %snapshot.id, error = %e, "Validation call failed");
                self.sessions
                    .with_matching_session_mut(&snapshot.id, |s| {
                        s.set_error(error_keys::VALIDATION, e.to_string());
                    })
                    .await;
                return Err(e.into());
            }
        };

        metrics::VALIDATIONS_TOTAL
            .with_label_values(&[if result.is_valid { "valid" } else { "invalid" }])
            .inc();

        enum Applied {
            Stale,
            Done(Option<(WorkflowState, WorkflowState)>),
        }

        let applied = self
            .sessions
            .with_matching_session_mut(&snapshot.id, |s| {
                if s.revision != snapshot.revision {
                    return Applied::Stale;
                }
                s.validation = Some(ValidationOutcome {
                    result: result.clone(),
                    revision: s.revision,
                    duration_ms,
                    computed_at: Utc::now(),
                });
                if result.is_valid {
                    s.clear_error(error_keys::VALIDATION);
                    if transition && s.state == WorkflowState::TicketValidation {
                        s.state = WorkflowState::Review;
                        return Applied::Done(Some((
                            WorkflowState::TicketValidation,
                            WorkflowState::Review,
                        )));
                    }
                } else {
                    s.set_error(error_keys::VALIDATION, result.summary());
                }
                Applied::Done(None)
            })
            .await;

        match applied {
            None => Err(SessionError::NoActiveSession.into()),
            Some(Applied::Stale) => {
                debug!(session_id = %snapshot.id, "Validation result discarded, ticket set changed");
                Err(WorkflowError::StaleValidation)
            }
            Some(Applied::Done(change)) => {
                self.audit(AuditEvent::ValidationCompleted {
                    session_id: snapshot.id.clone(),
                    is_valid: result.is_valid,
                    error_count: result.errors.len(),
                    duration_ms,
                })
                .await;
                if let Some((from, to)) = change {
                    self.record_transition(&snapshot.id, from, to).await;
                }
                Ok(result)
            }
        }
    }

    async fn run_calculation(
        &self,
        snapshot: &TransactionSession,
        transition: bool,
    ) -> Result<CalculationResult, WorkflowError> {
        let tickets = snapshot.tickets.ticket_nos();
        let started = Instant::now();
        let outcome = self.calc.calculate(snapshot.operation, &tickets, None).await;
        let elapsed = started.elapsed();
        metrics::CALCULATION_DURATION
            .with_label_values(&[])
            .observe(elapsed.as_secs_f64());
        let duration_ms = elapsed.as_millis() as u64;

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                metrics::CALCULATIONS_TOTAL.with_label_values(&["error"]).inc();
                warn!(session_id = %snapshot.id, error = %e, "Calculation call failed");
                self.sessions
                    .with_matching_session_mut(&snapshot.id, |s| {
                        s.set_error(error_keys::CALCULATION, e.to_string());
                    })
                    .await;
                return Err(e.into());
            }
        };

        metrics::CALCULATIONS_TOTAL.with_label_values(&["success"]).inc();

        // Payment must cover the amount collected from the customer. A
        // negative net is a payout; no coverage applies.
        let net = processor::net_amount(snapshot.operation, &snapshot.tickets, Some(&result));
        let shortfall = match &snapshot.payment {
            Some(payment) if net > Decimal::ZERO && payment.total_collected() < net => {
                Some(net - payment.total_collected())
            }
            _ => None,
        };

        enum Applied {
            Stale,
            Done(Option<(WorkflowState, WorkflowState)>),
        }

        let applied = self
            .sessions
            .with_matching_session_mut(&snapshot.id, |s| {
                if s.revision != snapshot.revision {
                    return Applied::Stale;
                }
                s.calculation = Some(CalculationOutcome {
                    result: result.clone(),
                    revision: s.revision,
                    duration_ms,
                    computed_at: Utc::now(),
                });
                match &shortfall {
                    Some(missing) => {
                        s.set_error(
                            error_keys::CALCULATION,
                            format!("payment short by {}", missing),
                        );
                        Applied::Done(None)
                    }
                    None => {
                        s.clear_error(error_keys::CALCULATION);
                        if transition && s.state == WorkflowState::PaymentValidation {
                            s.state = WorkflowState::StaffAuth;
                            return Applied::Done(Some((
                                WorkflowState::PaymentValidation,
                                WorkflowState::StaffAuth,
                            )));
                        }
                        Applied::Done(None)
                    }
                }
            })
            .await;

        match applied {
            None => Err(SessionError::NoActiveSession.into()),
            Some(Applied::Stale) => {
                metrics::STALE_CALCULATIONS.inc();
                debug!(session_id = %snapshot.id, "Calculation result discarded, ticket set changed");
                Err(WorkflowError::StaleCalculation)
            }
            Some(Applied::Done(change)) => {
                self.audit(AuditEvent::CalculationCompleted {
                    session_id: snapshot.id.clone(),
                    total_amount: result.total_amount,
                    duration_ms,
                })
                .await;
                if let Some(missing) = shortfall {
                    return Err(WorkflowError::Calculation(format!(
                        "payment short by {}",
                        missing
                    )));
                }
                if let Some((from, to)) = change {
                    self.record_transition(&snapshot.id, from, to).await;
                }
                Ok(result)
            }
        }
    }

    async fn check_authorization(
        &self,
        snapshot: &TransactionSession,
    ) -> Result<(), WorkflowError> {
        let net = processor::net_amount(
            snapshot.operation,
            &snapshot.tickets,
            snapshot.calculation.as_ref().map(|c| &c.result),
        );
        match self
            .policy
            .check(&snapshot.staff_auth, snapshot.tickets.len(), net)
        {
            Ok(()) => {
                self.sessions
                    .with_matching_session_mut(&snapshot.id, |s| {
                        s.clear_error(error_keys::AUTHORIZATION);
                    })
                    .await;
                Ok(())
            }
            Err(e) => {
                metrics::AUTH_REJECTIONS
                    .with_label_values(&[auth_reason_label(&e)])
                    .inc();
                warn!(session_id = %snapshot.id, reason = %e, "Authorization rejected");
                self.sessions
                    .with_matching_session_mut(&snapshot.id, |s| {
                        s.set_error(error_keys::AUTHORIZATION, e.to_string());
                    })
                    .await;
                self.audit(AuditEvent::AuthorizationRejected {
                    session_id: snapshot.id.clone(),
                    reason: e.to_string(),
                })
                .await;
                Err(e.into())
            }
        }
    }

    async fn run_commit(
        &self,
        snapshot: &TransactionSession,
    ) -> Result<WorkflowState, WorkflowError> {
        let payment = snapshot
            .payment
            .clone()
            .ok_or_else(|| WorkflowError::GuardFailed("no payment entered".to_string()))?;
        let operation = snapshot.operation;
        let from_state = snapshot.state;

        // Mark processing before the network call so ticket and payment
        // mutations are locked out for its duration.
        let marked = self
            .sessions
            .with_matching_session_mut(&snapshot.id, |s| {
                s.clear_error(error_keys::PROCESSING);
                s.state = WorkflowState::Processing;
            })
            .await;
        if marked.is_none() {
            return Err(SessionError::NoActiveSession.into());
        }
        self.record_transition(&snapshot.id, from_state, WorkflowState::Processing)
            .await;

        let request = CommitRequest {
            tickets: snapshot.tickets.ticket_nos(),
            payment,
            staff: snapshot.staff_auth.clone(),
        };
        let started = Instant::now();
        let outcome = match operation {
            OperationType::Renewal => self.commit.commit_renewal(&request).await,
            OperationType::Redemption => self.commit.commit_redemption(&request).await,
            OperationType::LostReport => self.commit.commit_lost_report(&request).await,
            OperationType::Combined => self.commit.commit_combined(&request).await,
        };
        metrics::COMMIT_DURATION
            .with_label_values(&[operation.as_str()])
            .observe(started.elapsed().as_secs_f64());

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                metrics::COMMITS_TOTAL
                    .with_label_values(&[operation.as_str(), "failed"])
                    .inc();
                warn!(session_id = %snapshot.id, error = %e, "Commit failed");
                let moved = self
                    .sessions
                    .with_matching_session_mut(&snapshot.id, |s| {
                        s.set_error(error_keys::PROCESSING, e.to_string());
                        s.state = WorkflowState::Failed;
                    })
                    .await;
                if moved.is_some() {
                    self.record_transition(&snapshot.id, WorkflowState::Processing, WorkflowState::Failed)
                        .await;
                    self.audit(AuditEvent::ProcessingFailed {
                        session_id: snapshot.id.clone(),
                        operation: operation.to_string(),
                        error: e.to_string(),
                    })
                    .await;
                }
                return Err(e.into());
            }
        };

        metrics::COMMITS_TOTAL
            .with_label_values(&[operation.as_str(), "success"])
            .inc();
        info!(
            session_id = %snapshot.id,
            transaction_id = %result.transaction_id,
            operation = %operation,
            "Transaction committed"
        );

        let committed_at = Utc::now();
        let records =
            processor::transactions_from_result(operation, &snapshot.tickets, &result, committed_at);
        {
            let mut recent = self.recent.write().await;
            for record in &records {
                if let Err(e) = self.history_store.append(record) {
                    // The remote commit already happened; a local log
                    // failure must not fail the transaction.
                    warn!(
                        transaction_id = %record.transaction_id(),
                        error = %e,
                        "Failed to persist history record"
                    );
                }
                recent.record(record.clone());
            }
        }

        self.audit(AuditEvent::TransactionCommitted {
            session_id: snapshot.id.clone(),
            transaction_id: result.transaction_id.clone(),
            operation: operation.to_string(),
            total_amount: result.total_amount,
        })
        .await;

        let applied = self
            .sessions
            .with_matching_session_mut(&snapshot.id, |s| {
                s.result = Some(result.clone());
                s.clear_error(error_keys::PROCESSING);
                s.state = WorkflowState::Confirmation;
            })
            .await;
        match applied {
            Some(()) => {
                self.record_transition(
                    &snapshot.id,
                    WorkflowState::Processing,
                    WorkflowState::Confirmation,
                )
                .await;
                Ok(WorkflowState::Confirmation)
            }
            // The session ended mid-flight. The commit stands and was
            // recorded in history; the session update becomes a no-op.
            None => Err(SessionError::NoActiveSession.into()),
        }
    }

    // ------------------------------------------------------------------
    // Workflow progression
    // ------------------------------------------------------------------

    async fn transition_to(
        &self,
        snapshot: &TransactionSession,
        to: WorkflowState,
    ) -> Result<WorkflowState, WorkflowError> {
        let from = snapshot.state;
        let applied = self
            .sessions
            .with_matching_session_mut(&snapshot.id, |s| {
                if s.state == from {
                    s.state = to;
                    true
                } else {
                    false
                }
            })
            .await;
        match applied {
            Some(true) => {
                self.record_transition(&snapshot.id, from, to).await;
                Ok(to)
            }
            Some(false) => Err(WorkflowError::GuardFailed(format!(
                "session left state {} concurrently",
                from
            ))),
            None => Err(SessionError::NoActiveSession.into()),
        }
    }

    /// Advance the workflow one step, running whatever the current state
    /// requires: validation, calculation, the authorization gate, or the
    /// commit itself. Only one advance may be in flight at a time; a
    /// concurrent call is rejected, never queued.
    pub async fn advance(&self) -> Result<WorkflowState, WorkflowError> {
        let _guard = AdvanceGuard::acquire(&self.advancing)?;
        let snapshot = self
            .sessions
            .snapshot()
            .await
            .ok_or(SessionError::NoActiveSession)?;

        match snapshot.state {
            WorkflowState::Idle => Err(WorkflowError::GuardFailed(
                "session is paused; resume it first".to_string(),
            )),
            WorkflowState::TicketEntry => {
                if snapshot.tickets.is_empty() {
                    return Err(WorkflowError::GuardFailed(
                        "no tickets in the session".to_string(),
                    ));
                }
                self.transition_to(&snapshot, WorkflowState::TicketValidation)
                    .await
            }
            WorkflowState::TicketValidation => {
                let result = self.run_validation(&snapshot, true).await?;
                if result.is_valid {
                    Ok(WorkflowState::Review)
                } else {
                    Err(WorkflowError::Validation(result.summary()))
                }
            }
            WorkflowState::Review => {
                if !snapshot.validation_is_current() {
                    return Err(WorkflowError::GuardFailed(
                        "ticket set changed since validation; validate again".to_string(),
                    ));
                }
                self.transition_to(&snapshot, WorkflowState::PaymentEntry)
                    .await
            }
            WorkflowState::PaymentEntry => {
                if snapshot.payment.is_none() {
                    return Err(WorkflowError::GuardFailed(
                        "no payment entered".to_string(),
                    ));
                }
                self.transition_to(&snapshot, WorkflowState::PaymentValidation)
                    .await
            }
            WorkflowState::PaymentValidation => {
                self.run_calculation(&snapshot, true).await?;
                Ok(WorkflowState::StaffAuth)
            }
            WorkflowState::StaffAuth => {
                self.check_authorization(&snapshot).await?;
                self.run_commit(&snapshot).await
            }
            WorkflowState::Processing => Err(WorkflowError::GuardFailed(
                "a commit is already in flight".to_string(),
            )),
            WorkflowState::Confirmation => {
                self.transition_to(&snapshot, WorkflowState::Complete).await
            }
            state => Err(WorkflowError::TerminalState(state.to_string())),
        }
    }

    /// Retreat one step to correct earlier input. Only the correction
    /// states support this; see [`WorkflowState::previous`].
    pub async fn go_to_previous_step(&self) -> Result<WorkflowState, WorkflowError> {
        if self.advancing.load(Ordering::SeqCst) {
            return Err(WorkflowError::OperationInProgress);
        }
        let (id, change) = self
            .sessions
            .with_session_mut(|s| {
                let from = s.state;
                match s.state.previous() {
                    Some(prev) => {
                        s.state = prev;
                        Ok((s.id.clone(), (from, prev)))
                    }
                    None => Err(WorkflowError::GuardFailed(format!(
                        "cannot go back from {}",
                        from
                    ))),
                }
            })
            .await??;
        self.record_transition(&id, change.0, change.1).await;
        Ok(change.1)
    }

    /// Re-dispatch the commit after a processing failure. Session data is
    /// preserved across the failure precisely so this can work.
    pub async fn retry_processing(&self) -> Result<WorkflowState, WorkflowError> {
        let _guard = AdvanceGuard::acquire(&self.advancing)?;
        let snapshot = self
            .sessions
            .snapshot()
            .await
            .ok_or(SessionError::NoActiveSession)?;
        if snapshot.state != WorkflowState::Failed {
            return Err(WorkflowError::GuardFailed(format!(
                "nothing to retry in state {}",
                snapshot.state
            )));
        }
        self.run_commit(&snapshot).await
    }

    /// Whether `advance()` would currently be accepted. Recomputed from
    /// live session state on every call, never cached: any error entry or
    /// an in-flight step makes it false.
    pub async fn can_proceed_to_next_step(&self) -> bool {
        if self.advancing.load(Ordering::SeqCst) {
            return false;
        }
        let Some(s) = self.sessions.snapshot().await else {
            return false;
        };
        if s.has_errors() {
            return false;
        }
        match s.state {
            WorkflowState::TicketEntry => !s.tickets.is_empty(),
            WorkflowState::TicketValidation => true,
            WorkflowState::Review => {
                s.validation_is_current()
                    && s.validation.as_ref().is_some_and(|v| v.result.is_valid)
            }
            WorkflowState::PaymentEntry => s.payment.is_some(),
            WorkflowState::PaymentValidation => true,
            WorkflowState::StaffAuth => !s.staff_auth.is_empty(),
            WorkflowState::Confirmation => true,
            _ => false,
        }
    }

    /// Compact status view of the engine and the active session.
    pub async fn status(&self) -> EngineStatus {
        let can_proceed = self.can_proceed_to_next_step().await;
        let processing = self.advancing.load(Ordering::SeqCst);
        match self.sessions.snapshot().await {
            Some(s) => EngineStatus {
                session_active: true,
                session_id: Some(s.id.clone()),
                operation: Some(s.operation),
                state: Some(s.state),
                ticket_count: s.tickets.len(),
                errors: s.errors.clone(),
                can_proceed,
                processing,
            },
            None => EngineStatus {
                session_active: false,
                session_id: None,
                operation: None,
                state: None,
                ticket_count: 0,
                errors: BTreeMap::new(),
                can_proceed: false,
                processing,
            },
        }
    }

    // ------------------------------------------------------------------
    // Real-time pushes
    // ------------------------------------------------------------------

    /// Merge a pushed ticket change into the active session. Only tickets
    /// actually in the session are touched; everything else is dropped.
    pub async fn apply_ticket_update(
        &self,
        ticket_no: &TicketNo,
        fields: TicketPatch,
    ) -> ApplyOutcome {
        let merged = self
            .sessions
            .with_session_mut(|s| {
                if !s.tickets.contains(ticket_no) {
                    return None;
                }
                if s.tickets.update(ticket_no, &fields) {
                    s.bump_revision();
                    s.record_pending_update(PendingUpdate {
                        ticket_no: ticket_no.clone(),
                        fields: fields.clone(),
                        received_at: Utc::now(),
                    });
                }
                Some(s.id.clone())
            })
            .await;

        let (outcome, session_id) = match merged {
            Err(_) => (ApplyOutcome::NoSession, None),
            Ok(None) => (ApplyOutcome::NotInSession, None),
            Ok(Some(id)) => (ApplyOutcome::Applied, Some(id)),
        };

        let label = match outcome {
            ApplyOutcome::Applied => "applied",
            ApplyOutcome::NotInSession => "not_in_session",
            ApplyOutcome::NoSession => "no_session",
        };
        metrics::REALTIME_UPDATES.with_label_values(&[label]).inc();

        match session_id {
            Some(session_id) => {
                self.audit(AuditEvent::RealtimeUpdateApplied {
                    session_id,
                    ticket_no: ticket_no.to_string(),
                })
                .await;
            }
            None => {
                self.audit(AuditEvent::RealtimeUpdateIgnored {
                    ticket_no: ticket_no.to_string(),
                })
                .await;
            }
        }
        outcome
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Most recent committed transactions, newest first.
    pub async fn recent_transactions(&self) -> Vec<Transaction> {
        self.recent.read().await.recent()
    }

    /// Look up a committed transaction by id, checking the in-memory ring
    /// before the durable store.
    pub async fn get_cached_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Transaction>, WorkflowError> {
        if let Some(tx) = self.recent.read().await.find(transaction_id) {
            return Ok(Some(tx.clone()));
        }
        Ok(self.history_store.find(transaction_id)?)
    }

    /// Seed the recent ring from the durable store. Called once at
    /// startup; in-progress session data is never restored, only
    /// committed history.
    pub async fn restore_recent_history(&self) -> Result<usize, WorkflowError> {
        let cap = self.session_cfg.recent_history_cap;
        let filter = HistoryFilter::new().with_limit(cap as u32);
        let records = self.history_store.list(&filter)?;
        let count = records.len();
        let mut recent = self.recent.write().await;
        *recent = RecentHistory::new(cap);
        recent.restore(records);
        info!(count, "Restored recent transaction history");
        Ok(count)
    }
}
