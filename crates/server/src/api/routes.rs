use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::audit::query_audit;
use super::handlers::{get_config, health, metrics};
use super::history::{get_transaction, list_history, recent_history};
use super::middleware::metrics_middleware;
use super::session::{
    add_staff_auth, advance, calculate, cancel_session, clear_staff_auth, end_session,
    get_session, pause_session, previous_step, remove_staff_auth, reset_session, resume_session,
    retry_processing, set_payment, start_session, validate,
};
use super::tickets::{add_ticket, clear_tickets, remove_ticket, update_ticket};
use super::ws::push_handler;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/config", get(get_config))
        .route("/metrics", get(metrics))
        .route("/audit", get(query_audit))
        .route(
            "/session",
            post(start_session).get(get_session).delete(end_session),
        )
        .route("/session/cancel", post(cancel_session))
        .route("/session/reset", post(reset_session))
        .route("/session/pause", post(pause_session))
        .route("/session/resume", post(resume_session))
        .route("/session/advance", post(advance))
        .route("/session/previous", post(previous_step))
        .route("/session/retry", post(retry_processing))
        .route("/session/validate", post(validate))
        .route("/session/calculate", post(calculate))
        .route("/session/payment", put(set_payment))
        .route(
            "/session/staff",
            post(add_staff_auth).delete(clear_staff_auth),
        )
        .route("/session/staff/remove", post(remove_staff_auth))
        .route(
            "/session/tickets",
            post(add_ticket).delete(clear_tickets),
        )
        .route("/session/tickets/remove", post(remove_ticket))
        .route("/session/tickets/update", post(update_ticket))
        .route("/history", get(list_history))
        .route("/history/recent", get(recent_history))
        .route("/history/{id}", get(get_transaction))
        .route("/push", get(push_handler));

    Router::new()
        .nest("/api/v1", api)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
