use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that take no credentials: the liveness probe and registration.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Load balancer probe. Never touches the store.
        .route("/health", get(handlers::health))
        // POST /accounts
        // Registration. Username and email uniqueness is enforced by the store.
        .route("/accounts", post(handlers::create_account))
}
