//! Shared helpers for integration tests.
//!
//! PostgreSQL tests read their connection settings from `PGHOST`, `PGPORT`,
//! `PGUSER` and `PGPASSWORD`; S3 tests from `CSVLAKE_S3_ENDPOINT`,
//! `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`. Tests that need a server
//! skip themselves when those variables are missing.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use csvlake::{DatabaseParams, ObjectStoreConfig};

/// Skip the current test when no PostgreSQL server is configured.
#[macro_export]
macro_rules! skip_if_no_postgres {
    () => {
        if !$crate::common::postgres_available() {
            eprintln!("Skipping test: PGHOST not set");
            return;
        }
    };
}

/// Skip the current test when no S3 endpoint is configured.
#[macro_export]
macro_rules! skip_if_no_s3 {
    () => {
        if !$crate::common::s3_available() {
            eprintln!("Skipping test: CSVLAKE_S3_ENDPOINT or AWS credentials not set");
            return;
        }
    };
}

pub fn postgres_available() -> bool {
    std::env::var("PGHOST").is_ok()
}

pub fn s3_available() -> bool {
    ["CSVLAKE_S3_ENDPOINT", "AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"]
        .iter()
        .all(|var| std::env::var(var).is_ok())
}

pub fn postgres_params() -> DatabaseParams {
    let env = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.to_string());

    DatabaseParams::new(
        env("PGHOST", "localhost"),
        env("PGUSER", "postgres"),
        env("PGPASSWORD", "postgres"),
    )
    .with_port(env("PGPORT", "5432").parse().expect("PGPORT must be a port number"))
    .with_connect_timeout(Duration::from_secs(10))
}

pub fn s3_config() -> ObjectStoreConfig {
    let var = |name: &str| std::env::var(name).unwrap_or_default();

    ObjectStoreConfig::new()
        .with_endpoint(var("CSVLAKE_S3_ENDPOINT"))
        .with_region(std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()))
        .with_credentials(var("AWS_ACCESS_KEY_ID"), var("AWS_SECRET_ACCESS_KEY"))
        .with_timeout(Duration::from_secs(30))
}

/// A lowercase name unique to this process and call, safe as a database or
/// bucket name.
pub fn unique_name(prefix: &str) -> String {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    format!(
        "{}-{}-{}-{}",
        prefix,
        std::process::id(),
        nanos,
        COUNTER.fetch_add(1, Ordering::SeqCst)
    )
}

/// Write `contents` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("Failed to write test file");
    path
}
