//! Workflow lifecycle integration tests.
//!
//! These tests drive the full engine with mock remote services:
//! - The happy path from ticket entry through commit and completion
//! - Commit failure, data preservation, and retry
//! - The staff authorization gate
//! - Staleness fencing when the ticket set changes mid-call
//! - Single-flight enforcement for network-backed steps
//! - Real-time pushed updates through the listener

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use tokio::sync::mpsc;

use pledgedesk_core::{
    authorize::AuthorizationError,
    history::{HistoryStore, SqliteHistoryStore, Transaction},
    service::{ServiceError, TransactionResult, ValidationResult},
    session::{error_keys, OperationType, PaymentRecord, SessionError, WorkflowState},
    testing::{fixtures, MockCalculationService, MockCommitService},
    ticket::TicketPatch,
    ApplyOutcome, AuthPolicy, PushEvent, TicketNo, UpdateListener, WorkflowEngine, WorkflowError,
};

/// Test helper wiring an engine to mock remote services and an in-memory
/// history store.
struct TestHarness {
    engine: Arc<WorkflowEngine>,
    calc: Arc<MockCalculationService>,
    commit: Arc<MockCommitService>,
    history: Arc<SqliteHistoryStore>,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_policy(AuthPolicy::default())
    }

    fn with_policy(policy: AuthPolicy) -> Self {
        let calc = Arc::new(MockCalculationService::new());
        let commit = Arc::new(MockCommitService::new());
        let history = Arc::new(SqliteHistoryStore::in_memory().expect("history store"));

        let engine = Arc::new(WorkflowEngine::new(
            policy,
            Default::default(),
            calc.clone(),
            commit.clone(),
            history.clone(),
        ));

        Self {
            engine,
            calc,
            commit,
            history,
        }
    }

    /// Start a renewal session holding one standard ticket.
    async fn start_renewal(&self) {
        self.engine
            .start_session(OperationType::Renewal)
            .await
            .expect("start session");
        self.engine
            .add_ticket(fixtures::ticket("B/0725/1234", dec!(1200), dec!(36)))
            .await
            .expect("add ticket");
    }

    /// Drive the session from ticket entry to staff-auth with a cash
    /// payment covering the calculated total.
    async fn advance_to_staff_auth(&self, total: rust_decimal::Decimal) {
        self.calc.set_calculation_total(total).await;
        self.engine.advance().await.expect("to ticket-validation");
        self.engine.advance().await.expect("to review");
        self.engine.advance().await.expect("to payment-entry");
        self.engine
            .set_payment(PaymentRecord::cash(total))
            .await
            .expect("set payment");
        self.engine.advance().await.expect("to payment-validation");
        self.engine.advance().await.expect("to staff-auth");
    }

    async fn state(&self) -> WorkflowState {
        self.engine.session_snapshot().await.expect("session").state
    }
}

fn renewal_result(id: &str, total: rust_decimal::Decimal) -> TransactionResult {
    TransactionResult {
        transaction_id: id.to_string(),
        receipts: vec![format!("R-{}", id)],
        updated_tickets: vec!["B/0725/1234".parse().unwrap()],
        new_tickets: vec!["B/0825/0001".parse().unwrap()],
        total_amount: total,
        change_amount: None,
    }
}

#[tokio::test]
async fn test_happy_renewal_path() {
    let h = TestHarness::new();
    h.commit.set_result(renewal_result("T100", dec!(36))).await;

    h.start_renewal().await;
    assert_eq!(h.state().await, WorkflowState::TicketEntry);
    assert!(h.engine.can_proceed_to_next_step().await);

    h.advance_to_staff_auth(dec!(36)).await;
    assert_eq!(h.state().await, WorkflowState::StaffAuth);

    h.engine
        .add_staff_auth(fixtures::staff("S001"))
        .await
        .expect("staff auth");
    assert_eq!(
        h.engine.advance().await.expect("commit"),
        WorkflowState::Confirmation
    );

    let session = h.engine.session_snapshot().await.unwrap();
    let result = session.result.clone().expect("commit result stored");
    assert_eq!(result.transaction_id, "T100");
    assert_eq!(result.total_amount, dec!(36));
    assert!(!session.has_errors());

    assert_eq!(
        h.engine.advance().await.expect("complete"),
        WorkflowState::Complete
    );

    // One commit RPC went out, against the renewal endpoint.
    let commits = h.commit.commits().await;
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].endpoint, "renewal");
    assert_eq!(commits[0].request.tickets.len(), 1);

    // Committed history is durable and mirrored in the recent ring.
    let recent = h.engine.recent_transactions().await;
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].transaction_id(), "T100");
    assert!(matches!(recent[0], Transaction::Renewal { .. }));
    assert!(h.history.find("T100").unwrap().is_some());

    let cached = h
        .engine
        .get_cached_transaction("T100")
        .await
        .unwrap()
        .expect("cached");
    assert_eq!(cached.amount(), dec!(36));

    // Ending the session does not touch history.
    let ended = h.engine.end_session(None).await.unwrap();
    assert_eq!(ended.state, WorkflowState::Complete);
    assert_eq!(h.engine.recent_transactions().await.len(), 1);
}

#[tokio::test]
async fn test_commit_failure_preserves_session_for_retry() {
    let h = TestHarness::new();
    h.commit.set_result(renewal_result("T101", dec!(36))).await;
    h.commit
        .fail_next(ServiceError::Network("gateway unreachable".to_string()))
        .await;

    h.start_renewal().await;
    h.advance_to_staff_auth(dec!(36)).await;
    h.engine
        .add_staff_auth(fixtures::staff("S001"))
        .await
        .unwrap();

    let err = h.engine.advance().await.unwrap_err();
    assert!(matches!(err, WorkflowError::Service(ServiceError::Network(_))));

    let session = h.engine.session_snapshot().await.unwrap();
    assert_eq!(session.state, WorkflowState::Failed);
    assert!(session.errors.contains_key(error_keys::PROCESSING));
    // Everything entered so far survives the failure.
    assert_eq!(session.tickets.len(), 1);
    assert!(session.payment.is_some());
    assert_eq!(session.staff_auth.len(), 1);
    assert!(!h.engine.can_proceed_to_next_step().await);
    assert!(h.engine.recent_transactions().await.is_empty());

    // The retry re-dispatches the same commit and clears the error.
    assert_eq!(
        h.engine.retry_processing().await.expect("retry"),
        WorkflowState::Confirmation
    );
    let session = h.engine.session_snapshot().await.unwrap();
    assert!(!session.errors.contains_key(error_keys::PROCESSING));
    assert_eq!(session.result.unwrap().transaction_id, "T101");
    assert_eq!(h.commit.commit_count().await, 2);
}

#[tokio::test]
async fn test_retry_outside_failed_state_is_rejected() {
    let h = TestHarness::new();
    h.start_renewal().await;
    let err = h.engine.retry_processing().await.unwrap_err();
    assert!(matches!(err, WorkflowError::GuardFailed(_)));
}

#[tokio::test]
async fn test_dual_staff_gate_requires_distinct_codes() {
    // Three tickets trips the dual-staff threshold.
    let h = TestHarness::with_policy(AuthPolicy {
        dual_staff_ticket_count: 3,
        ..AuthPolicy::default()
    });
    h.commit.set_result(renewal_result("T102", dec!(90))).await;

    h.engine
        .start_session(OperationType::Renewal)
        .await
        .unwrap();
    for i in 1..=3 {
        h.engine
            .add_ticket(fixtures::ticket(
                &format!("B/0725/000{}", i),
                dec!(500),
                dec!(30),
            ))
            .await
            .unwrap();
    }
    h.advance_to_staff_auth(dec!(90)).await;

    h.engine
        .add_staff_auth(fixtures::staff("S001"))
        .await
        .unwrap();
    let err = h.engine.advance().await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Authorization(AuthorizationError::DualStaffRequired)
    ));
    let session = h.engine.session_snapshot().await.unwrap();
    assert_eq!(session.state, WorkflowState::StaffAuth);
    assert!(session.errors.contains_key(error_keys::AUTHORIZATION));

    // The same person cannot countersign.
    let err = h
        .engine
        .add_staff_auth(fixtures::staff("S001"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Authorization(AuthorizationError::DuplicateStaffCode(_))
    ));

    // A second staff member unblocks the commit.
    h.engine
        .add_staff_auth(fixtures::staff("S002"))
        .await
        .unwrap();
    assert_eq!(
        h.engine.advance().await.expect("commit"),
        WorkflowState::Confirmation
    );
}

#[tokio::test]
async fn test_validation_retry_clears_error() {
    let h = TestHarness::new();
    h.calc
        .set_validation(ValidationResult::invalid(
            "tickets[0].status",
            "ticket already redeemed",
        ))
        .await;

    h.start_renewal().await;
    h.engine.advance().await.unwrap(); // to ticket-validation
    assert!(h.engine.advance().await.is_err());
    assert!(!h.engine.can_proceed_to_next_step().await);

    // Advancing again from ticket-validation is the retry action; with the
    // rule now passing it clears the error and moves on.
    h.calc.set_validation(ValidationResult::valid()).await;
    assert_eq!(h.engine.advance().await.unwrap(), WorkflowState::Review);
    assert!(!h.engine.session_snapshot().await.unwrap().has_errors());
}

#[tokio::test]
async fn test_on_demand_checks_skip_remote_calls_with_no_tickets() {
    let h = TestHarness::new();
    h.engine
        .start_session(OperationType::Renewal)
        .await
        .expect("start session");

    let err = h.engine.validate_tickets().await.unwrap_err();
    assert!(matches!(err, WorkflowError::GuardFailed(_)));
    let err = h.engine.calculate_totals().await.unwrap_err();
    assert!(matches!(err, WorkflowError::GuardFailed(_)));

    // Neither check reached the back office.
    assert!(h.calc.validate_calls().await.is_empty());
    assert!(h.calc.calculate_calls().await.is_empty());
}

#[tokio::test]
async fn test_ticket_change_invalidates_validation() {
    let h = TestHarness::new();
    h.start_renewal().await;
    h.engine.advance().await.unwrap();
    h.engine.advance().await.unwrap();
    assert_eq!(h.state().await, WorkflowState::Review);

    // A ticket mutation at review bumps the revision; the stored
    // validation no longer counts.
    h.engine
        .add_ticket(fixtures::ticket("B/0725/5678", dec!(800), dec!(24)))
        .await
        .unwrap();
    assert!(!h.engine.can_proceed_to_next_step().await);
    let err = h.engine.advance().await.unwrap_err();
    assert!(matches!(err, WorkflowError::GuardFailed(_)));
}

#[tokio::test]
async fn test_stale_calculation_is_discarded() {
    let h = TestHarness::new();
    h.calc.set_calculation_total(dec!(36)).await;
    h.calc.set_delay(Duration::from_millis(200)).await;

    h.start_renewal().await;
    h.engine.advance().await.unwrap();
    h.engine.advance().await.unwrap();
    h.engine.advance().await.unwrap();
    h.engine
        .set_payment(PaymentRecord::cash(dec!(36)))
        .await
        .unwrap();
    h.engine.advance().await.unwrap();
    assert_eq!(h.state().await, WorkflowState::PaymentValidation);

    let engine = h.engine.clone();
    let advance = tokio::spawn(async move { engine.advance().await });

    // While the calculation is in flight, a pushed update changes the
    // ticket set underneath it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let no: TicketNo = "B/0725/1234".parse().unwrap();
    let patch = TicketPatch {
        interest_due: Some(dec!(48)),
        ..Default::default()
    };
    assert_eq!(
        h.engine.apply_ticket_update(&no, patch).await,
        ApplyOutcome::Applied
    );

    let err = advance.await.unwrap().unwrap_err();
    assert!(matches!(err, WorkflowError::StaleCalculation));

    // The resolved result was thrown away; the session never left
    // payment-validation and holds no calculation for the new revision.
    let session = h.engine.session_snapshot().await.unwrap();
    assert_eq!(session.state, WorkflowState::PaymentValidation);
    assert!(!session.calculation_is_current());
}

#[tokio::test]
async fn test_concurrent_advance_is_rejected_not_queued() {
    let h = TestHarness::new();
    h.calc.set_delay(Duration::from_millis(200)).await;

    h.start_renewal().await;
    h.engine.advance().await.unwrap(); // to ticket-validation

    let engine = h.engine.clone();
    let first = tokio::spawn(async move { engine.advance().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!h.engine.can_proceed_to_next_step().await);
    let err = h.engine.advance().await.unwrap_err();
    assert!(matches!(err, WorkflowError::OperationInProgress));

    // The in-flight advance still resolves normally.
    assert_eq!(first.await.unwrap().unwrap(), WorkflowState::Review);
}

#[tokio::test]
async fn test_end_session_mid_commit_is_a_noop_on_the_next_session() {
    let h = TestHarness::new();
    h.commit.set_result(renewal_result("T103", dec!(36))).await;
    h.commit.set_delay(Duration::from_millis(200)).await;

    h.start_renewal().await;
    h.advance_to_staff_auth(dec!(36)).await;
    h.engine
        .add_staff_auth(fixtures::staff("S001"))
        .await
        .unwrap();

    let engine = h.engine.clone();
    let advance = tokio::spawn(async move { engine.advance().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    h.engine.end_session(Some("walked away".to_string())).await;

    // The commit went through remotely and was recorded, but the session
    // it belonged to is gone, so the resolution has nothing to apply to.
    let err = advance.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Session(SessionError::NoActiveSession)
    ));
    assert!(h.engine.session_snapshot().await.is_none());
    assert!(h.history.find("T103").unwrap().is_some());
}

#[tokio::test]
async fn test_update_listener_feeds_the_engine() {
    let h = TestHarness::new();
    h.start_renewal().await;

    let (tx, rx) = mpsc::channel(16);
    let listener = UpdateListener::new(h.engine.clone());
    listener.start(rx);

    tx.send(PushEvent::TicketUpdate {
        ticket_no: "B/0725/1234".parse().unwrap(),
        fields: TicketPatch {
            interest_due: Some(dec!(40)),
            ..Default::default()
        },
    })
    .await
    .unwrap();
    // A push for a ticket outside the session is dropped silently.
    tx.send(PushEvent::TicketUpdate {
        ticket_no: "B/0725/9999".parse().unwrap(),
        fields: TicketPatch {
            interest_due: Some(dec!(99)),
            ..Default::default()
        },
    })
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let session = h.engine.session_snapshot().await.unwrap();
    let no: TicketNo = "B/0725/1234".parse().unwrap();
    assert_eq!(session.tickets.get(&no).unwrap().interest_due, dec!(40));
    assert_eq!(session.pending_updates.len(), 1);
    assert_eq!(session.tickets.len(), 1);

    listener.stop();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!listener.is_running());
}

#[tokio::test]
async fn test_combined_commit_records_per_ticket_history() {
    let h = TestHarness::new();
    h.commit
        .set_result(TransactionResult {
            transaction_id: "T200".to_string(),
            receipts: vec!["R-T200".to_string()],
            updated_tickets: vec![],
            new_tickets: vec![],
            total_amount: dec!(5),
            change_amount: None,
        })
        .await;

    h.engine
        .start_session(OperationType::Combined)
        .await
        .unwrap();
    h.engine
        .add_ticket(fixtures::ticket("B/0725/0001", dec!(100), dec!(10)))
        .await
        .unwrap();
    h.engine
        .add_ticket(fixtures::ticket("B/0725/0002", dec!(150), dec!(15)))
        .await
        .unwrap();
    h.engine
        .add_ticket(fixtures::redemption_ticket("B/0725/0003", dec!(20), dec!(2)))
        .await
        .unwrap();

    h.advance_to_staff_auth(dec!(5)).await;
    h.engine
        .add_staff_auth(fixtures::staff("S001"))
        .await
        .unwrap();
    h.engine.advance().await.expect("commit");

    let commits = h.commit.commits().await;
    assert_eq!(commits[0].endpoint, "combined");

    // One addressable record per settled ticket.
    let recent = h.engine.recent_transactions().await;
    assert_eq!(recent.len(), 3);
    assert!(h.history.find("T200-1").unwrap().is_some());
    assert!(h.history.find("T200-3").unwrap().is_some());
    assert!(matches!(
        h.history.find("T200-3").unwrap().unwrap(),
        Transaction::Redemption { .. }
    ));
}

#[tokio::test]
async fn test_restore_recent_history_on_startup() {
    let history = Arc::new(SqliteHistoryStore::in_memory().unwrap());
    for i in 1..=4 {
        history
            .append(&Transaction::Redemption {
                transaction_id: format!("T{}", i),
                ticket_no: "B/0725/1234".parse().unwrap(),
                amount: dec!(1250),
                receipts: vec![],
                committed_at: chrono::Utc::now() + chrono::Duration::seconds(i),
            })
            .unwrap();
    }

    let engine = WorkflowEngine::new(
        AuthPolicy::default(),
        Default::default(),
        Arc::new(MockCalculationService::new()),
        Arc::new(MockCommitService::new()),
        history,
    );

    assert_eq!(engine.restore_recent_history().await.unwrap(), 4);
    let recent = engine.recent_transactions().await;
    assert_eq!(recent[0].transaction_id(), "T4");
    assert!(engine
        .get_cached_transaction("T1")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_pause_resume_and_second_session_rejected() {
    let h = TestHarness::new();
    h.start_renewal().await;

    let err = h
        .engine
        .start_session(OperationType::Redemption)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Session(SessionError::AlreadyActive(_))
    ));

    assert_eq!(h.engine.pause_session().await.unwrap(), WorkflowState::Idle);
    let err = h.engine.advance().await.unwrap_err();
    assert!(matches!(err, WorkflowError::GuardFailed(_)));

    assert_eq!(
        h.engine.resume_session().await.unwrap(),
        WorkflowState::TicketEntry
    );
    assert_eq!(h.engine.session_snapshot().await.unwrap().tickets.len(), 1);
}
