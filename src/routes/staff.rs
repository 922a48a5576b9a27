use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Staff Router Module
///
/// Queue work, notice publishing and result ingestion. Mounted behind the same
/// authentication layer as the authenticated routes; which role levels actually succeed
/// is decided by the Authorization Gate inside each service.
pub fn staff_routes() -> Router<AppState> {
    Router::new()
        // POST /requests/query
        // The caller's queue (levels 2-4 only).
        .route("/requests/query", post(handlers::query_requests))
        // POST /requests/{id}/state
        // Forward-only lifecycle step by the owning queue's staff.
        .route("/requests/{id}/state", post(handlers::transition_request))
        // POST /notices, POST /notices/{id}
        .route("/notices", post(handlers::create_notice))
        .route("/notices/{id}", post(handlers::update_notice))
        // POST /results
        // Examination-cell ingestion.
        .route("/results", post(handlers::record_result))
}
