//! In-process object store
//!
//! Keeps objects in an ordered map so listings come back in key order, the
//! same as S3. Uploads, deletes and listings can be made to fail per key or
//! prefix to exercise continue-on-error paths, and presigning can be switched
//! off to simulate an unavailable backend.

use super::{ObjectStore, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
}

/// In-memory [`ObjectStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    bucket: String,
    bucket_exists: AtomicBool,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    failing_keys: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
    failing_listings: Mutex<HashSet<String>>,
    presign_disabled: AtomicBool,
    put_attempts: AtomicUsize,
}

impl MemoryStore {
    /// Empty store for a bucket that does not exist yet
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    /// Seed an object
    pub fn insert(&self, key: impl Into<String>, body: impl Into<Bytes>) {
        self.objects.lock().insert(
            key.into(),
            StoredObject {
                body: body.into(),
                content_type: None,
            },
        );
    }

    /// Make every upload to `key` fail
    pub fn fail_uploads_to(&self, key: impl Into<String>) {
        self.failing_keys.lock().insert(key.into());
    }

    /// Make every delete of `key` fail
    pub fn fail_deletes_of(&self, key: impl Into<String>) {
        self.failing_deletes.lock().insert(key.into());
    }

    /// Make listings of exactly `prefix` fail
    pub fn fail_listing_of(&self, prefix: impl Into<String>) {
        self.failing_listings.lock().insert(prefix.into());
    }

    /// Make presign requests fail
    pub fn disable_presign(&self) {
        self.presign_disabled.store(true, Ordering::SeqCst);
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }

    pub fn bucket_exists(&self) -> bool {
        self.bucket_exists.load(Ordering::SeqCst)
    }

    /// Number of upload attempts, failed ones included
    pub fn put_attempts(&self) -> usize {
        self.put_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn ensure_bucket(&self) -> Result<bool, StorageError> {
        Ok(!self.bucket_exists.swap(true, Ordering::SeqCst))
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        if self.failing_listings.lock().contains(prefix) {
            return Err(StorageError::RequestError(format!(
                "ListObjectsV2 failed for prefix {}",
                prefix
            )));
        }

        Ok(self
            .objects
            .lock()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn put_file(
        &self,
        path: &Path,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);

        if self.failing_keys.lock().contains(key) {
            return Err(StorageError::RequestError(format!(
                "Access Denied for {}",
                key
            )));
        }

        let body = tokio::fs::read(path).await?;
        self.objects.lock().insert(
            key.to_string(),
            StoredObject {
                body: Bytes::from(body),
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(())
    }

    async fn presign_put(
        &self,
        key: &str,
        expires_in: Duration,
        _content_type: Option<&str>,
    ) -> Result<String, StorageError> {
        if self.presign_disabled.load(Ordering::SeqCst) {
            return Err(StorageError::RequestError(
                "storage backend unavailable".into(),
            ));
        }

        Ok(format!(
            "memory://{}/{}?expires={}",
            self.bucket,
            key.replace(' ', "%20"),
            expires_in.as_secs()
        ))
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        if self.failing_deletes.lock().contains(key) {
            return Err(StorageError::RequestError(format!(
                "Access Denied for {}",
                key
            )));
        }

        self.objects.lock().remove(key);
        Ok(())
    }

    async fn object_exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.lock().contains_key(key))
    }
}
