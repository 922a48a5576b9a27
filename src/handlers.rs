use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    models::{
        AccountProfile, CreateNoticeRequest, CreateServiceRequest, Envelope, ExamResult, Notice,
        NoticeQuery, PresignedUrlRequest, PresignedUrlResponse, RecordResultRequest,
        RegisterAccountRequest, ServiceBanner, ServiceRequest, TransitionRequest,
        UpdateNoticeRequest, UpdateProfileRequest, UpdateServiceRequest,
    },
    storage::{ALLOWED_CONTENT_TYPES, upload_key},
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};

// Bodies are taken as `Result<Json<T>, JsonRejection>` so malformed JSON is reported in the
// shared error envelope instead of axum's plain-text rejection.

/// health
///
/// [Public Route] Liveness probe.
#[utoipa::path(get, path = "/health", responses((status = 200, description = "Alive")))]
pub async fn health() -> &'static str {
    "ok"
}

/// create_account
///
/// [Public Route] Registers an account. `roleLevel` outside 1..=5 silently becomes 1.
#[utoipa::path(
    post,
    path = "/accounts",
    request_body = RegisterAccountRequest,
    responses(
        (status = 201, description = "Registered", body = AccountProfile),
        (status = 400, description = "Missing or malformed field"),
        (status = 409, description = "Username or email taken")
    )
)]
pub async fn create_account(
    State(state): State<AppState>,
    payload: Result<Json<RegisterAccountRequest>, JsonRejection>,
) -> Result<Envelope<AccountProfile>, AppError> {
    let Json(payload) = payload?;
    let account = state.identity().register(payload).await?;
    Ok(Envelope::created(AccountProfile::from(&account)))
}

/// login
///
/// [Authenticated Route] Confirms the credentials and returns the caller's profile.
#[utoipa::path(
    post,
    path = "/login",
    responses(
        (status = 200, description = "Profile", body = AccountProfile),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Envelope<AccountProfile>, AppError> {
    let account = state.identity().account(user.id).await?;
    Ok(Envelope::ok(AccountProfile::from(&account)))
}

/// index
///
/// [Authenticated Route] Service banner naming the caller and their role.
#[utoipa::path(get, path = "/", responses((status = 200, description = "Banner", body = ServiceBanner)))]
pub async fn index(user: AuthUser) -> Envelope<ServiceBanner> {
    Envelope::ok(ServiceBanner {
        name: user.username,
        api: env!("CARGO_PKG_NAME").to_string(),
        kind: user.role.name().to_string(),
    })
}

/// create_request
///
/// [Authenticated Route] Raises a request. The queue is derived from `type`.
#[utoipa::path(
    post,
    path = "/requests",
    request_body = CreateServiceRequest,
    responses(
        (status = 201, description = "Created", body = ServiceRequest),
        (status = 400, description = "Title or type missing"),
        (status = 403, description = "Role cannot raise requests")
    )
)]
pub async fn create_request(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateServiceRequest>, JsonRejection>,
) -> Result<Envelope<ServiceRequest>, AppError> {
    let Json(payload) = payload?;
    let request = state.workflow().create(&user, payload).await?;
    Ok(Envelope::created(request))
}

/// query_requests
///
/// [Staff Route] The caller's queue, newest change first. Levels 1 and 5 get 403.
#[utoipa::path(
    post,
    path = "/requests/query",
    responses(
        (status = 200, description = "Queue", body = [ServiceRequest]),
        (status = 403, description = "No queue for this role")
    )
)]
pub async fn query_requests(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Envelope<Vec<ServiceRequest>>, AppError> {
    let requests = state.workflow().list(&user).await?;
    Ok(Envelope::ok(requests))
}

/// update_request
///
/// [Authenticated Route] Owner-only edit of title and content.
#[utoipa::path(
    post,
    path = "/requests/{id}",
    params(("id" = i64, Path, description = "Request ID")),
    request_body = UpdateServiceRequest,
    responses(
        (status = 200, description = "Updated", body = ServiceRequest),
        (status = 403, description = "Not the requester"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Concurrent modification")
    )
)]
pub async fn update_request(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateServiceRequest>, JsonRejection>,
) -> Result<Envelope<ServiceRequest>, AppError> {
    let Json(payload) = payload?;
    let request = state.workflow().update(&user, id, payload).await?;
    Ok(Envelope::ok(request))
}

/// transition_request
///
/// [Staff Route] Moves a request one step forward in its lifecycle.
#[utoipa::path(
    post,
    path = "/requests/{id}/state",
    params(("id" = i64, Path, description = "Request ID")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Transitioned", body = ServiceRequest),
        (status = 400, description = "Edge not allowed"),
        (status = 403, description = "Another queue's request"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn transition_request(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Envelope<ServiceRequest>, AppError> {
    let Json(payload) = payload?;
    let request = state
        .workflow()
        .transition(&user, id, payload.state)
        .await?;
    Ok(Envelope::ok(request))
}

/// create_notice
///
/// [Staff Route] Publishes a notice to a branch.
#[utoipa::path(
    post,
    path = "/notices",
    request_body = CreateNoticeRequest,
    responses(
        (status = 201, description = "Published", body = Notice),
        (status = 403, description = "Students cannot publish")
    )
)]
pub async fn create_notice(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateNoticeRequest>, JsonRejection>,
) -> Result<Envelope<Notice>, AppError> {
    let Json(payload) = payload?;
    let notice = state.notices().create(&user, payload).await?;
    Ok(Envelope::created(notice))
}

/// query_notices
///
/// [Authenticated Route] Notices of one branch, branch taken from the query string.
#[utoipa::path(
    get,
    path = "/notices/query",
    params(NoticeQuery),
    responses((status = 200, description = "Notices", body = [Notice]))
)]
pub async fn query_notices(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<NoticeQuery>,
) -> Result<Envelope<Vec<Notice>>, AppError> {
    let notices = state.notices().list(&user, query.branch).await?;
    Ok(Envelope::ok(notices))
}

/// query_notices_body
///
/// [Authenticated Route] Same as `query_notices` with the branch in a JSON body.
#[utoipa::path(
    post,
    path = "/notices/query",
    request_body = NoticeQuery,
    responses((status = 200, description = "Notices", body = [Notice]))
)]
pub async fn query_notices_body(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<NoticeQuery>, JsonRejection>,
) -> Result<Envelope<Vec<Notice>>, AppError> {
    let Json(query) = payload?;
    let notices = state.notices().list(&user, query.branch).await?;
    Ok(Envelope::ok(notices))
}

/// update_notice
///
/// [Staff Route] Creator-only edit. The body `id`, when present, must match the path.
#[utoipa::path(
    post,
    path = "/notices/{id}",
    params(("id" = i64, Path, description = "Notice ID")),
    request_body = UpdateNoticeRequest,
    responses(
        (status = 200, description = "Updated", body = Notice),
        (status = 403, description = "Not the creator"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_notice(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateNoticeRequest>, JsonRejection>,
) -> Result<Envelope<Notice>, AppError> {
    let Json(payload) = payload?;
    if payload.id.is_some_and(|body_id| body_id != id) {
        return Err(AppError::validation("body id does not match the path"));
    }
    let notice = state.notices().update(&user, id, payload).await?;
    Ok(Envelope::ok(notice))
}

/// query_results
///
/// [Authenticated Route] The caller's own results by semester.
#[utoipa::path(
    post,
    path = "/results/query",
    responses((status = 200, description = "Results", body = [ExamResult]))
)]
pub async fn query_results(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Envelope<Vec<ExamResult>>, AppError> {
    let results = state.results().list(&user).await?;
    Ok(Envelope::ok(results))
}

/// record_result
///
/// [Staff Route] Exam-cell ingestion of one semester of marks.
#[utoipa::path(
    post,
    path = "/results",
    request_body = RecordResultRequest,
    responses(
        (status = 201, description = "Recorded", body = ExamResult),
        (status = 400, description = "Length mismatch or already recorded"),
        (status = 403, description = "Not the examination cell")
    )
)]
pub async fn record_result(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<RecordResultRequest>, JsonRejection>,
) -> Result<Envelope<ExamResult>, AppError> {
    let Json(payload) = payload?;
    let result = state.results().ingest(&user, payload).await?;
    Ok(Envelope::created(result))
}

/// update_profile
///
/// [Authenticated Route] Writes whichever profile fields are present.
#[utoipa::path(
    post,
    path = "/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = AccountProfile),
        (status = 400, description = "Invalid field"),
        (status = 409, description = "Email or roll number taken")
    )
)]
pub async fn update_profile(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Envelope<AccountProfile>, AppError> {
    let Json(payload) = payload?;
    let account = state.identity().update_profile(&user, payload).await?;
    Ok(Envelope::ok(AccountProfile::from(&account)))
}

/// get_presigned_url
///
/// [Authenticated Route] Short-lived PUT URL for a notice attachment or card scan. The
/// returned `resource_key` is what later goes into `attachment_key` or a card field.
#[utoipa::path(
    post,
    path = "/uploads/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 400, description = "Unsupported file type")
    )
)]
pub async fn get_presigned_url(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<PresignedUrlRequest>, JsonRejection>,
) -> Result<Envelope<PresignedUrlResponse>, AppError> {
    let Json(payload) = payload?;
    if payload.filename.trim().is_empty() {
        return Err(AppError::validation("filename is required"));
    }
    if !ALLOWED_CONTENT_TYPES.contains(&payload.file_type.as_str()) {
        return Err(AppError::validation(format!(
            "file_type must be one of {}",
            ALLOWED_CONTENT_TYPES.join(", ")
        )));
    }

    let resource_key = upload_key(user.id, &payload.filename);
    let upload_url = state
        .storage
        .get_presigned_upload_url(&resource_key, &payload.file_type)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "presigned url generation failed"))?;

    Ok(Envelope::ok(PresignedUrlResponse {
        upload_url,
        resource_key,
    }))
}
