//! Object storage for uploaded files. Objects are addressed by their public URL.

use crate::error::AppError;
use crate::settings::StorageSettings;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use axum::body::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`; returns the public URL.
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<String, AppError>;

    /// Remove the object behind `url`. URLs this store did not issue are ignored.
    async fn delete(&self, url: &str) -> Result<(), AppError>;
}

/// `{uuid}-{name}` with anything outside `[A-Za-z0-9._-]` replaced by '_'.
pub fn object_key(file_name: &str) -> String {
    let base = file_name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(file_name);
    let clean: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    let clean = if clean.is_empty() { "file".to_string() } else { clean };
    format!("{}-{}", uuid::Uuid::new_v4(), clean)
}

pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    base_url: String,
}

impl S3Store {
    pub async fn connect(settings: &StorageSettings) -> Self {
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret.clone(),
            None,
            None,
            "hr-console",
        );
        let conf = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;
        S3Store {
            client: aws_sdk_s3::Client::new(&conf),
            bucket: settings.bucket.clone(),
            base_url: format!("https://{}.s3.{}.amazonaws.com/", settings.bucket, settings.region),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<String, AppError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("upload {}: {}", key, e)))?;
        tracing::info!(bucket = %self.bucket, key, "object stored");
        Ok(format!("{}{}", self.base_url, key))
    }

    async fn delete(&self, url: &str) -> Result<(), AppError> {
        let Some(key) = url.strip_prefix(&self.base_url) else {
            return Ok(());
        };
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("delete {}: {}", key, e)))?;
        tracing::info!(bucket = %self.bucket, key, "object deleted");
        Ok(())
    }
}

/// In-process store; used by tests and local runs without a bucket.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, (String, Bytes)>>,
}

impl MemoryStore {
    const BASE_URL: &'static str = "memory://";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, url: &str) -> bool {
        url.strip_prefix(Self::BASE_URL)
            .map(|key| self.objects.lock().map(|m| m.contains_key(key)).unwrap_or(false))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<String, AppError> {
        self.objects
            .lock()
            .map_err(|_| AppError::Storage("memory store poisoned".into()))?
            .insert(key.to_string(), (content_type.to_string(), bytes));
        Ok(format!("{}{}", Self::BASE_URL, key))
    }

    async fn delete(&self, url: &str) -> Result<(), AppError> {
        if let Some(key) = url.strip_prefix(Self::BASE_URL) {
            self.objects
                .lock()
                .map_err(|_| AppError::Storage("memory store poisoned".into()))?
                .remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed_and_sanitized() {
        let key = object_key("C:\\scans\\offer letter (1).pdf");
        let (prefix, name) = key.split_at(36);
        assert!(uuid::Uuid::parse_str(prefix).is_ok());
        assert_eq!(name, "-offer_letter__1_.pdf");
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        let url = store.put("a.png", "image/png", Bytes::from_static(b"png")).await.unwrap();
        assert!(store.contains(&url));
        store.delete("https://elsewhere/a.png").await.unwrap();
        assert_eq!(store.len(), 1);
        store.delete(&url).await.unwrap();
        assert!(store.is_empty());
    }
}
