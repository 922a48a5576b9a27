use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Endpoints any account may call once its Basic-Auth credentials verify. Ownership
/// checks (request edits, profile) are made by the services against the resolved `AuthUser`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /
        // Banner confirming who the caller authenticated as.
        .route("/", get(handlers::index))
        // POST /login
        // Credentials are checked per call; this just returns the profile.
        .route("/login", post(handlers::login))
        // --- Requests ---
        // POST /requests
        // Students raise a request; it is routed to a queue by type.
        .route("/requests", post(handlers::create_request))
        // POST /requests/{id}
        // Requester-only edit of title and content.
        .route("/requests/{id}", post(handlers::update_request))
        // --- Notices ---
        // GET|POST /notices/query
        // Branch listing, newest first.
        .route(
            "/notices/query",
            get(handlers::query_notices).post(handlers::query_notices_body),
        )
        // --- Results & Profile ---
        .route("/results/query", post(handlers::query_results))
        .route("/profile", post(handlers::update_profile))
        // POST /uploads/presigned
        // Direct-to-storage upload URL for attachments and card scans.
        .route("/uploads/presigned", post(handlers::get_presigned_url))
}
