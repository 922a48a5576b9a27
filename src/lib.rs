use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod repository;
pub mod storage;

// Domain services. Each is a thin handle over the shared repository.
pub mod identity;
pub mod notices;
pub mod results;
pub mod workflow;

pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public, staff};

// --- Public Re-exports ---

pub use auth::{Argon2Hasher, HasherState};
pub use config::AppConfig;
pub use error::AppError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

use identity::IdentityStore;
use notices::NoticeBoard;
use results::ResultLedger;
use workflow::RequestWorkflow;

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::create_account, handlers::login, handlers::index,
        handlers::create_request, handlers::query_requests, handlers::update_request,
        handlers::transition_request, handlers::create_notice, handlers::query_notices,
        handlers::query_notices_body, handlers::update_notice, handlers::query_results,
        handlers::record_result, handlers::update_profile, handlers::get_presigned_url
    ),
    components(
        schemas(
            models::ServiceRequest, models::Notice, models::ExamResult, models::AccountProfile,
            models::ServiceBanner, models::RegisterAccountRequest, models::CreateServiceRequest,
            models::UpdateServiceRequest, models::TransitionRequest, models::CreateNoticeRequest,
            models::UpdateNoticeRequest, models::NoticeQuery, models::RecordResultRequest,
            models::UpdateProfileRequest, models::PresignedUrlRequest,
            models::PresignedUrlResponse,
        )
    ),
    tags(
        (name = "campus-portal", description = "Campus administration API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply cloneable container for every service dependency.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    /// Credential hashing, injected so tests can run with a cheap cost.
    pub hasher: HasherState,
    pub storage: StorageState,
    pub config: AppConfig,
}

impl AppState {
    pub fn identity(&self) -> IdentityStore {
        IdentityStore::new(self.repo.clone(), self.hasher.clone())
    }

    pub fn workflow(&self) -> RequestWorkflow {
        RequestWorkflow::new(self.repo.clone())
    }

    pub fn notices(&self) -> NoticeBoard {
        NoticeBoard::new(self.repo.clone())
    }

    pub fn results(&self) -> ResultLedger {
        ResultLedger::new(self.repo.clone())
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for HasherState {
    fn from_ref(app_state: &AppState) -> HasherState {
        app_state.hasher.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the call with 401 unless `AuthUser` resolves. The resolved identity is cached
/// in the request extensions, so the handler's own `AuthUser` does not verify twice.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles every route with its middleware and binds the shared state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Staff routes share the authentication layer; role checks live in the services.
        .merge(
            authenticated::authenticated_routes()
                .merge(staff::staff_routes())
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one HTTP call, carrying the `x-request-id` so every log line of the call
/// can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
