//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Sessions (lifecycle, workflow transitions)
//! - Pipeline (validation, calculation)
//! - Transactions (commits by operation and result)
//! - External services (back-office gateway, push channel)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Session Metrics
// =============================================================================

/// Sessions started total by operation type.
pub static SESSIONS_STARTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pledgedesk_sessions_started_total", "Total sessions started"),
        &["operation"], // "renewal", "redemption", "lost_report", "combined"
    )
    .unwrap()
});

/// Sessions ended total by final state.
pub static SESSIONS_ENDED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pledgedesk_sessions_ended_total", "Total sessions ended"),
        &["final_state"], // "complete", "failed", "cancelled", "abandoned"
    )
    .unwrap()
});

/// Workflow state transitions total.
pub static STATE_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pledgedesk_state_transitions_total",
            "Total workflow state transitions",
        ),
        &["from", "to"],
    )
    .unwrap()
});

/// Session duration from start to terminal state, in seconds.
pub static SESSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "pledgedesk_session_duration_seconds",
            "Duration of sessions from start to terminal state",
        )
        .buckets(vec![10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["final_state"],
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Validation calls total by result.
pub static VALIDATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pledgedesk_validations_total", "Total validation calls"),
        &["result"], // "valid", "invalid", "error"
    )
    .unwrap()
});

/// Validation call duration in seconds.
pub static VALIDATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "pledgedesk_validation_duration_seconds",
            "Duration of validation calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &[],
    )
    .unwrap()
});

/// Calculation calls total by result.
pub static CALCULATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pledgedesk_calculations_total", "Total calculation calls"),
        &["result"], // "success", "error"
    )
    .unwrap()
});

/// Calculation call duration in seconds.
pub static CALCULATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "pledgedesk_calculation_duration_seconds",
            "Duration of calculation calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &[],
    )
    .unwrap()
});

/// Stale calculation results discarded after a ticket-set change.
pub static STALE_CALCULATIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "pledgedesk_stale_calculations_total",
        "Calculation results discarded because the ticket set changed mid-call",
    )
    .unwrap()
});

// =============================================================================
// Transaction Metrics
// =============================================================================

/// Commits total by operation and result.
pub static COMMITS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("pledgedesk_commits_total", "Total commit attempts"),
        &["operation", "result"], // result: "success", "failed"
    )
    .unwrap()
});

/// Commit call duration in seconds.
pub static COMMIT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "pledgedesk_commit_duration_seconds",
            "Duration of commit calls",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"],
    )
    .unwrap()
});

/// Authorization checks rejected by reason.
pub static AUTH_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pledgedesk_auth_rejections_total",
            "Staff authorization rejections",
        ),
        &["reason"], // "dual_staff", "manager_approval", "duplicate_code", "no_credentials"
    )
    .unwrap()
});

// =============================================================================
// Real-Time Update Metrics
// =============================================================================

/// Pushed ticket updates by outcome.
pub static REALTIME_UPDATES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pledgedesk_realtime_updates_total",
            "Pushed ticket updates received",
        ),
        &["outcome"], // "applied", "not_in_session", "no_session"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Sessions
        Box::new(SESSIONS_STARTED.clone()),
        Box::new(SESSIONS_ENDED.clone()),
        Box::new(STATE_TRANSITIONS.clone()),
        Box::new(SESSION_DURATION.clone()),
        // Pipeline
        Box::new(VALIDATIONS_TOTAL.clone()),
        Box::new(VALIDATION_DURATION.clone()),
        Box::new(CALCULATIONS_TOTAL.clone()),
        Box::new(CALCULATION_DURATION.clone()),
        Box::new(STALE_CALCULATIONS.clone()),
        // Transactions
        Box::new(COMMITS_TOTAL.clone()),
        Box::new(COMMIT_DURATION.clone()),
        Box::new(AUTH_REJECTIONS.clone()),
        // Real-time updates
        Box::new(REALTIME_UPDATES.clone()),
    ]
}
