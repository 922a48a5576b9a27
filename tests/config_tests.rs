use campus_portal::{AppConfig, config::Env};
use serial_test::serial;
use std::{env, panic};

const VARS: [&str; 9] = [
    "APP_ENV",
    "DATABASE_URL",
    "BIND_ADDR",
    "STORE_TIMEOUT_SECS",
    "HASH_MEMORY_KIB",
    "S3_ENDPOINT",
    "S3_ACCESS_KEY",
    "S3_SECRET_KEY",
    "S3_BUCKET_NAME",
];

// --- Setup/Teardown Utilities ---

/// Runs `test` with a clean slate for every config variable and restores the originals
/// afterwards, even when the test panics.
fn run_with_env<T, R>(test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> =
        VARS.iter().map(|&var| (var, env::var(var).ok())).collect();
    unsafe {
        for var in VARS {
            env::remove_var(var);
        }
    }

    let result = panic::catch_unwind(test);

    for (key, original_value) in originals {
        unsafe {
            match original_value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn test_local_defaults_without_database() {
    let config = run_with_env(AppConfig::load);

    assert_eq!(config.env, Env::Local);
    assert!(config.db_url.is_none(), "no DATABASE_URL selects the in-memory store");
    assert_eq!(config.bind_addr, "0.0.0.0:3000");
    assert_eq!(config.store_timeout_secs, 5);
    assert_eq!(config.hash_memory_kib, 19_456);
    assert_eq!(config.s3_endpoint, "http://localhost:9000");
    assert_eq!(config.s3_bucket, "campus-uploads");
}

#[test]
#[serial]
fn test_local_overrides_are_read() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("DATABASE_URL", "postgres://u:p@localhost/campus");
            env::set_var("BIND_ADDR", "127.0.0.1:8080");
            env::set_var("STORE_TIMEOUT_SECS", "2");
            env::set_var("HASH_MEMORY_KIB", "8192");
        }
        AppConfig::load()
    });

    assert_eq!(config.db_url.as_deref(), Some("postgres://u:p@localhost/campus"));
    assert_eq!(config.bind_addr, "127.0.0.1:8080");
    assert_eq!(config.store_timeout_secs, 2);
    assert_eq!(config.hash_memory_kib, 8192);
}

#[test]
#[serial]
fn test_production_fails_fast_on_missing_secrets() {
    let result = run_with_env(|| {
        panic::catch_unwind(|| {
            unsafe {
                env::set_var("APP_ENV", "production");
                env::set_var("DATABASE_URL", "postgres://u:p@db/campus");
            }
            // S3_ENDPOINT and both S3 keys are missing.
            AppConfig::load()
        })
    });

    assert!(result.is_err(), "production must refuse to start half-configured");
}

#[test]
#[serial]
fn test_production_loads_when_complete() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("APP_ENV", "production");
            env::set_var("DATABASE_URL", "postgres://u:p@db/campus");
            env::set_var("S3_ENDPOINT", "https://storage.example");
            env::set_var("S3_ACCESS_KEY", "key");
            env::set_var("S3_SECRET_KEY", "secret");
        }
        AppConfig::load()
    });

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.db_url.as_deref(), Some("postgres://u:p@db/campus"));
    assert_eq!(config.s3_key, "key");
}

#[test]
#[serial]
fn test_unparseable_number_panics() {
    let result = run_with_env(|| {
        panic::catch_unwind(|| {
            unsafe {
                env::set_var("STORE_TIMEOUT_SECS", "soon");
            }
            AppConfig::load()
        })
    });
    assert!(result.is_err());
}

#[test]
fn test_default_config_is_cheap_and_local() {
    let config = AppConfig::default();
    assert_eq!(config.env, Env::Local);
    assert!(config.db_url.is_none());
    assert!(config.hash_memory_kib < 1024);
}
