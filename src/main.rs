use campus_portal::{
    AppState,
    auth::{Argon2Hasher, HasherState},
    config::{AppConfig, Env},
    create_router,
    repository::{InMemoryRepository, PostgresRepository, RepositoryState},
    storage::{S3StorageClient, StorageService, StorageState},
};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, the store, hashing and storage, then serves
/// the router until the process is stopped.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "campus_portal=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    let repo = match &config.db_url {
        Some(db_url) => {
            let timeout = Duration::from_secs(config.store_timeout_secs);
            // Every statement is bounded server-side so a stuck query fails instead of hanging.
            let options = PgConnectOptions::from_str(db_url)
                .expect("FATAL: DATABASE_URL is not a valid Postgres URL")
                .options([("statement_timeout", timeout.as_millis().to_string())]);

            let pool = PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(timeout)
                .connect_with(options)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            sqlx::migrate!()
                .run(&pool)
                .await
                .expect("FATAL: database migrations failed");

            Arc::new(PostgresRepository::new(pool)) as RepositoryState
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store, data is not persisted");
            Arc::new(InMemoryRepository::new()) as RepositoryState
        }
    };

    let hasher = Arc::new(
        Argon2Hasher::new(config.hash_memory_kib).expect("FATAL: invalid HASH_MEMORY_KIB"),
    ) as HasherState;

    let s3_client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    )
    .await;

    // MinIO buckets are provisioned on the fly for local runs.
    if config.env == Env::Local {
        s3_client.ensure_bucket_exists().await;
    }
    let storage = Arc::new(s3_client) as StorageState;

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        hasher,
        storage,
        config,
    };

    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: cannot bind {bind_addr}: {e}"));

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server terminated");
    }
}
