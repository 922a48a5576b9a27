use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use campus_portal::{
    AppConfig, AppState, create_router,
    auth::{Argon2Hasher, HasherState},
    repository::{InMemoryRepository, RepositoryState},
    storage::{MockStorageService, StorageState},
};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

fn app_with(repo: InMemoryRepository, storage: MockStorageService) -> Router {
    let state = AppState {
        repo: Arc::new(repo) as RepositoryState,
        hasher: Arc::new(Argon2Hasher::new(64).unwrap()) as HasherState,
        storage: Arc::new(storage) as StorageState,
        config: AppConfig::default(),
    };
    create_router(state)
}

fn app() -> Router {
    app_with(InMemoryRepository::new(), MockStorageService::new())
}

fn basic(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

fn json_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register(app: &Router, username: &str, role: i64) {
    let body = format!(
        r#"{{"username":"{username}","password":"pw","email":"{username}@college.edu","roleLevel":{role}}}"#
    );
    let response = app
        .clone()
        .oneshot(json_post("/accounts", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_missing_credentials_get_basic_challenge() {
    let response = app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response.headers().get(header::WWW_AUTHENTICATE).unwrap();
    assert!(challenge.to_str().unwrap().starts_with("Basic"));
    let body = body_json(response).await;
    assert_eq!(body["code"], 401);
    assert_eq!(body["content"], "invalid credentials");
}

#[tokio::test]
async fn test_unknown_user_and_wrong_password_look_identical() {
    let app = app();
    register(&app, "alice", 1).await;

    let mut bodies = Vec::new();
    for (user, password) in [("alice", "wrong"), ("nobody", "pw")] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header(header::AUTHORIZATION, basic(user, password))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        bodies.push(body_json(response).await);
    }
    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn test_banner_names_the_caller() {
    let app = app();
    register(&app, "bob", 2).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header(header::AUTHORIZATION, basic("bob", "pw"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["content"]["name"], "bob");
    assert_eq!(body["content"]["api"], "campus-portal");
    assert_eq!(body["content"]["type"], "exam_cell");
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_envelope() {
    let response = app()
        .oneshot(json_post("/accounts", "{not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], 400);
    assert!(body["content"].is_string());
}

#[tokio::test]
async fn test_missing_field_names_the_field() {
    let response = app()
        .oneshot(json_post("/accounts", r#"{"username":"x","password":"pw"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["content"], "email is required");
}

#[tokio::test]
async fn test_store_outage_maps_to_503_without_leaking_detail() {
    let app = app_with(InMemoryRepository::new_unavailable(), MockStorageService::new());
    let response = app
        .oneshot(json_post(
            "/accounts",
            r#"{"username":"x","password":"pw","email":"x@college.edu"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["content"], "the request could not be completed");
}

#[tokio::test]
async fn test_storage_failure_is_internal_error() {
    let app = app_with(InMemoryRepository::new(), MockStorageService::new_failing());
    register(&app, "alice", 1).await;

    let mut request = json_post(
        "/uploads/presigned",
        r#"{"filename":"id.png","file_type":"image/png"}"#,
    );
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, basic("alice", "pw").parse().unwrap());

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert!(doc["paths"]["/requests/{id}/state"].is_object());
}
