//! Abstractions over the object stores that hold manifest files and the
//! published tracking index.
//!
//! The namespace is flat and last-write-wins per path. Every implementation
//! reports an object's `url` equal to its `path`, so callers can treat the
//! two interchangeably.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "trackdex-manifests".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("sdk error: {0}")]
    Sdk(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("object not found: {0}")]
    NotFound(String),
}

impl BucketError {
    fn from_sdk(err: impl fmt::Display) -> Self {
        Self::Sdk(err.to_string())
    }
}

/// One listed object. `uploaded_at` drives the newest-first ordering rules
/// in the index builder and combiner.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub path: String,
    pub url: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[async_trait]
pub trait BucketStore: Send + Sync {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, BucketError>;
    async fn get(&self, url: &str) -> Result<Bytes, BucketError>;
    async fn put(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, BucketError>;
    async fn delete(&self, url: &str) -> Result<(), BucketError>;
}

#[derive(Clone)]
pub struct S3BucketStore {
    client: Client,
    bucket: String,
}

impl S3BucketStore {
    pub async fn new(config: S3Config) -> Result<Self, BucketError> {
        if config.bucket.is_empty() {
            return Err(BucketError::Configuration(
                "bucket name cannot be empty".into(),
            ));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = Credentials::new(access_key, secret_key, None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(credentials));
        }

        let shared_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        let client = Client::from_conf(builder.build());
        Ok(Self {
            client,
            bucket: config.bucket,
        })
    }
}

#[async_trait]
impl BucketStore for S3BucketStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, BucketError> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(BucketError::from_sdk)?;

            for object in output.contents() {
                let Some(key) = object.key() else { continue };
                let uploaded_at = object
                    .last_modified()
                    .map(|ts| Utc.timestamp_opt(ts.secs(), 0).single().unwrap_or_default())
                    .unwrap_or_default();
                objects.push(ObjectMeta {
                    path: key.to_string(),
                    url: key.to_string(),
                    size: object.size().unwrap_or_default().max(0) as u64,
                    uploaded_at,
                });
            }

            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(objects)
    }

    async fn get(&self, url: &str) -> Result<Bytes, BucketError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(url)
            .send()
            .await
            .map_err(|err| match err {
                SdkError::ServiceError(service_err) => {
                    let message = service_err.err().to_string();
                    if message.contains("NoSuchKey") {
                        BucketError::NotFound(url.to_string())
                    } else {
                        BucketError::from_sdk(message)
                    }
                }
                other => BucketError::from_sdk(other),
            })?;

        let data = output.body.collect().await.map_err(BucketError::from_sdk)?;
        Ok(Bytes::from(data.into_bytes()))
    }

    async fn put(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, BucketError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(BucketError::from_sdk)?;
        Ok(path.to_string())
    }

    async fn delete(&self, url: &str) -> Result<(), BucketError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(url)
            .send()
            .await
            .map_err(BucketError::from_sdk)?;
        Ok(())
    }
}

/// Store rooted at a local directory, for running the pipeline against a
/// plain folder of manifests with no cloud credentials. Upload timestamps
/// come from file mtimes.
#[derive(Debug, Clone)]
pub struct LocalBucketStore {
    root: PathBuf,
}

impl LocalBucketStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn relative(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.root)
            .ok()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
    }
}

#[async_trait]
impl BucketStore for LocalBucketStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, BucketError> {
        let mut objects = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Some(relative) = self.relative(&path) else {
                    continue;
                };
                if !relative.starts_with(prefix) {
                    continue;
                }
                let metadata = entry.metadata().await?;
                let uploaded_at = metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_default();
                objects.push(ObjectMeta {
                    url: relative.clone(),
                    path: relative,
                    size: metadata.len(),
                    uploaded_at,
                });
            }
        }

        objects.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(objects)
    }

    async fn get(&self, url: &str) -> Result<Bytes, BucketError> {
        match tokio::fs::read(self.resolve(url)).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(BucketError::NotFound(url.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn put(
        &self,
        path: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<String, BucketError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, &bytes).await?;
        Ok(path.to_string())
    }

    async fn delete(&self, url: &str) -> Result<(), BucketError> {
        match tokio::fs::remove_file(self.resolve(url)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(BucketError::NotFound(url.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory store used by pipeline tests. `insert_at` pins an upload
/// timestamp so recency-ordering rules can be exercised deterministically.
#[derive(Debug, Default)]
pub struct MemoryBucketStore {
    objects: Mutex<BTreeMap<String, (Bytes, DateTime<Utc>)>>,
}

impl MemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_at(&self, path: &str, bytes: impl Into<Bytes>, uploaded_at: DateTime<Utc>) {
        self.objects
            .lock()
            .expect("memory store poisoned")
            .insert(path.to_string(), (bytes.into(), uploaded_at));
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects
            .lock()
            .expect("memory store poisoned")
            .contains_key(path)
    }
}

#[async_trait]
impl BucketStore for MemoryBucketStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, BucketError> {
        let objects = self.objects.lock().expect("memory store poisoned");
        Ok(objects
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, (bytes, uploaded_at))| ObjectMeta {
                path: path.clone(),
                url: path.clone(),
                size: bytes.len() as u64,
                uploaded_at: *uploaded_at,
            })
            .collect())
    }

    async fn get(&self, url: &str) -> Result<Bytes, BucketError> {
        let objects = self.objects.lock().expect("memory store poisoned");
        objects
            .get(url)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| BucketError::NotFound(url.to_string()))
    }

    async fn put(
        &self,
        path: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<String, BucketError> {
        self.objects
            .lock()
            .expect("memory store poisoned")
            .insert(path.to_string(), (bytes, Utc::now()));
        Ok(path.to_string())
    }

    async fn delete(&self, url: &str) -> Result<(), BucketError> {
        let removed = self
            .objects
            .lock()
            .expect("memory store poisoned")
            .remove(url);
        match removed {
            Some(_) => Ok(()),
            None => Err(BucketError::NotFound(url.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryBucketStore::new();
        store
            .put("manifests/a.csv", Bytes::from_static(b"x"), "text/csv")
            .await
            .unwrap();

        let listed = store.list("manifests/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "manifests/a.csv");
        assert_eq!(store.get("manifests/a.csv").await.unwrap(), "x");

        store.delete("manifests/a.csv").await.unwrap();
        assert!(matches!(
            store.get("manifests/a.csv").await,
            Err(BucketError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn local_store_lists_with_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBucketStore::new(dir.path());

        store
            .put("manifests/a.csv", Bytes::from_static(b"a"), "text/csv")
            .await
            .unwrap();
        store
            .put("other/b.csv", Bytes::from_static(b"b"), "text/csv")
            .await
            .unwrap();

        let listed = store.list("manifests/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "manifests/a.csv");
        assert_eq!(listed[0].size, 1);

        store.delete("manifests/a.csv").await.unwrap();
        assert!(store.list("manifests/").await.unwrap().is_empty());
    }
}
