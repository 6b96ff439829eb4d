use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use trackdex_bucket::{BucketStore, LocalBucketStore, S3BucketStore, S3Config};
use trackdex_core::builder::BuildConfig;
use trackdex_core::combiner::CombineConfig;

/// Connect to the manifest store. `TRACKDEX_LOCAL_DIR` selects the
/// local-directory mode; otherwise the S3-compatible store is used.
pub async fn connect_store() -> Result<Arc<dyn BucketStore>> {
    if let Ok(dir) = std::env::var("TRACKDEX_LOCAL_DIR") {
        tracing::info!(dir = %dir, "using local manifest directory");
        return Ok(Arc::new(LocalBucketStore::new(dir)));
    }

    let config = S3Config {
        bucket: env_or("TRACKDEX_BUCKET", "trackdex-manifests"),
        region: env_or("TRACKDEX_REGION", "us-east-1"),
        endpoint: std::env::var("TRACKDEX_ENDPOINT").ok(),
        access_key_id: std::env::var("TRACKDEX_ACCESS_KEY_ID").ok(),
        secret_access_key: std::env::var("TRACKDEX_SECRET_ACCESS_KEY").ok(),
        force_path_style: std::env::var("TRACKDEX_FORCE_PATH_STYLE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false),
    };
    let store = S3BucketStore::new(config)
        .await
        .context("failed to configure the manifest store")?;
    Ok(Arc::new(store))
}

pub fn build_config() -> Result<BuildConfig> {
    let defaults = BuildConfig::default();
    Ok(BuildConfig {
        manifest_prefix: env_or("TRACKDEX_MANIFEST_PREFIX", &defaults.manifest_prefix),
        index_path: env_or("TRACKDEX_INDEX_PATH", &defaults.index_path),
        fetch_timeout: fetch_timeout(defaults.fetch_timeout)?,
        fetch_concurrency: fetch_concurrency(defaults.fetch_concurrency)?,
    })
}

pub fn combine_config() -> Result<CombineConfig> {
    let defaults = CombineConfig::default();
    Ok(CombineConfig {
        manifest_prefix: env_or("TRACKDEX_MANIFEST_PREFIX", &defaults.manifest_prefix),
        fetch_timeout: fetch_timeout(defaults.fetch_timeout)?,
        fetch_concurrency: fetch_concurrency(defaults.fetch_concurrency)?,
    })
}

fn fetch_timeout(default: Duration) -> Result<Duration> {
    match std::env::var("TRACKDEX_FETCH_TIMEOUT_SECS") {
        Ok(raw) => {
            let secs: u64 = raw
                .parse()
                .context("TRACKDEX_FETCH_TIMEOUT_SECS must be an integer")?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(default),
    }
}

fn fetch_concurrency(default: usize) -> Result<usize> {
    match std::env::var("TRACKDEX_FETCH_CONCURRENCY") {
        Ok(raw) => raw
            .parse()
            .context("TRACKDEX_FETCH_CONCURRENCY must be an integer"),
        Err(_) => Ok(default),
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
