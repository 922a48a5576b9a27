use std::env;

/// AppConfig
///
/// Immutable runtime configuration, loaded once at startup and shared through `AppState`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string. Locally it may be absent, which selects the in-memory store.
    pub db_url: Option<String>,
    pub env: Env,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Upper bound for acquiring a pooled connection and for any single statement.
    pub store_timeout_secs: u64,
    // Argon2 memory cost in KiB.
    pub hash_memory_kib: u32,
    // S3-compatible storage endpoint URL (MinIO locally).
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_key: String,
    pub s3_secret: String,
    // Bucket for notice attachments and profile card scans.
    pub s3_bucket: String,
}

/// Env
///
/// Runtime context. Local enables the in-memory fallback, MinIO bucket provisioning and
/// pretty logs; Production requires every secret to be set explicitly.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_HASH_MEMORY_KIB: u32 = 19_456;

impl Default for AppConfig {
    /// default
    ///
    /// Non-panicking values for test state. The hash cost is tiny so tests stay fast.
    fn default() -> Self {
        Self {
            db_url: None,
            env: Env::Local,
            bind_addr: "127.0.0.1:0".to_string(),
            store_timeout_secs: DEFAULT_STORE_TIMEOUT_SECS,
            hash_memory_kib: 64,
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_key: "admin".to_string(),
            s3_secret: "password".to_string(),
            s3_bucket: "campus-test".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the environment.
    ///
    /// # Panics
    /// Panics when a variable required for the current environment is missing or a numeric
    /// setting cannot be parsed, so the server never starts half-configured.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let store_timeout_secs = parsed_or("STORE_TIMEOUT_SECS", DEFAULT_STORE_TIMEOUT_SECS);
        let hash_memory_kib = parsed_or("HASH_MEMORY_KIB", DEFAULT_HASH_MEMORY_KIB);

        match env {
            Env::Local => Self {
                db_url: env::var("DATABASE_URL").ok(),
                env: Env::Local,
                bind_addr,
                store_timeout_secs,
                hash_memory_kib,
                // MinIO from docker-compose, with its well-known default credentials.
                s3_endpoint: env::var("S3_ENDPOINT")
                    .unwrap_or_else(|_| "http://localhost:9000".to_string()),
                s3_region: "us-east-1".to_string(),
                s3_key: env::var("S3_ACCESS_KEY").unwrap_or_else(|_| "admin".to_string()),
                s3_secret: env::var("S3_SECRET_KEY").unwrap_or_else(|_| "password".to_string()),
                s3_bucket: env::var("S3_BUCKET_NAME")
                    .unwrap_or_else(|_| "campus-uploads".to_string()),
            },
            Env::Production => Self {
                db_url: Some(
                    env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                ),
                env: Env::Production,
                bind_addr,
                store_timeout_secs,
                hash_memory_kib,
                s3_endpoint: env::var("S3_ENDPOINT").expect("FATAL: S3_ENDPOINT required in prod"),
                s3_region: env::var("S3_REGION").unwrap_or_else(|_| "stub".to_string()),
                s3_key: env::var("S3_ACCESS_KEY").expect("FATAL: S3_ACCESS_KEY required in prod"),
                s3_secret: env::var("S3_SECRET_KEY")
                    .expect("FATAL: S3_SECRET_KEY required in prod"),
                s3_bucket: env::var("S3_BUCKET_NAME")
                    .unwrap_or_else(|_| "campus-uploads".to_string()),
            },
        }
    }
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {key} must be a number, got {raw:?}")),
        Err(_) => default,
    }
}
