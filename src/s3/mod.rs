//! Object storage module
//!
//! Defines the storage capability the rest of the crate works against
//! ([`ObjectStore`]) and its two implementations:
//!
//! - [`S3Client`] - AWS S3 (or any S3-compatible endpoint) via `aws-sdk-s3`
//! - [`MemoryStore`] - in-process store used by tests and dry runs
//!
//! # Tracing
//!
//! All S3 operations are instrumented:
//!
//! | Operation | Span Name | Attributes |
//! |-----------|-----------|------------|
//! | HeadBucket/CreateBucket | `s3.ensure_bucket` | bucket, region |
//! | ListObjectsV2 | `s3.list_objects` | bucket, prefix, keys |
//! | PutObject | `s3.put_object` | bucket, key, content_type |
//! | PutObject (presigned) | `s3.presign_put` | bucket, key, expiry_secs |
//! | DeleteObject | `s3.delete_object` | bucket, key |
//! | HeadObject | `s3.head_object` | bucket, key |

use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub mod credentials;
pub mod memory;

pub use credentials::CredentialsProvider;
pub use memory::MemoryStore;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Storage capability consumed by the sync driver, upload service and
/// maintenance operations.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket/container this store writes to
    fn bucket(&self) -> &str;

    /// Create the bucket if it does not exist yet. Returns `true` if it was created.
    async fn ensure_bucket(&self) -> Result<bool, StorageError>;

    /// All keys starting with `prefix`, in key order
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Upload a local file under `key`
    async fn put_file(
        &self,
        path: &Path,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<(), StorageError>;

    /// Time-limited URL permitting a single PUT to `key`
    async fn presign_put(
        &self,
        key: &str,
        expires_in: Duration,
        content_type: Option<&str>,
    ) -> Result<String, StorageError>;

    /// Delete the object stored under `key`
    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;

    /// Whether an object exists under `key`
    async fn object_exists(&self, key: &str) -> Result<bool, StorageError>;
}

/// S3 client backed by the AWS SDK
#[derive(Clone)]
pub struct S3Client {
    client: aws_sdk_s3::Client,
    bucket: String,
    region: String,
}

impl S3Client {
    /// Build a client from storage configuration.
    ///
    /// Fails only on configuration problems; connectivity is first exercised
    /// by [`ObjectStore::ensure_bucket`] or the first request.
    pub async fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let credentials = CredentialsProvider::resolve(config)
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));
        if let Some(creds) = credentials {
            loader = loader.credentials_provider(creds);
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(ref endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::debug!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "S3 client configured"
        );

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
        })
    }

    /// Get the region
    pub fn region(&self) -> &str {
        &self.region
    }
}

fn request_error<E>(err: aws_sdk_s3::error::SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::RequestError(DisplayErrorContext(err).to_string())
}

#[async_trait]
impl ObjectStore for S3Client {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    #[tracing::instrument(
        name = "s3.ensure_bucket",
        skip(self),
        fields(s3.bucket = %self.bucket, s3.region = %self.region),
        err
    )]
    async fn ensure_bucket(&self) -> Result<bool, StorageError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => return Ok(false),
            Err(e) => {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false);
                if !missing {
                    return Err(request_error(e));
                }
            }
        }

        tracing::info!(bucket = %self.bucket, "Bucket not found, creating it");

        let mut request = self.client.create_bucket().bucket(&self.bucket);
        // us-east-1 is the only region that rejects an explicit location constraint
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        request.send().await.map_err(request_error)?;

        Ok(true)
    }

    #[tracing::instrument(
        name = "s3.list_objects",
        skip(self),
        fields(s3.bucket = %self.bucket, s3.prefix = %prefix, s3.keys = tracing::field::Empty),
        err
    )]
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(request_error)?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );
        }

        tracing::Span::current().record("s3.keys", keys.len());
        Ok(keys)
    }

    #[tracing::instrument(
        name = "s3.put_object",
        skip(self, path),
        fields(s3.bucket = %self.bucket, s3.key = %key, http.content_type = ?content_type),
        err
    )]
    async fn put_file(
        &self,
        path: &Path,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::IoError(std::io::Error::other(e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .body(body)
            .send()
            .await
            .map_err(request_error)?;

        Ok(())
    }

    #[tracing::instrument(
        name = "s3.presign_put",
        skip(self),
        fields(s3.bucket = %self.bucket, s3.key = %key, expiry_secs = expires_in.as_secs()),
        err
    )]
    async fn presign_put(
        &self,
        key: &str,
        expires_in: Duration,
        content_type: Option<&str>,
    ) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .presigned(presigning)
            .await
            .map_err(request_error)?;

        Ok(request.uri().to_string())
    }

    #[tracing::instrument(
        name = "s3.delete_object",
        skip(self),
        fields(s3.bucket = %self.bucket, s3.key = %key),
        err
    )]
    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(request_error)?;
        Ok(())
    }

    #[tracing::instrument(
        name = "s3.head_object",
        skip(self),
        fields(s3.bucket = %self.bucket, s3.key = %key),
        err
    )]
    async fn object_exists(&self, key: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false);
                if missing {
                    Ok(false)
                } else {
                    Err(request_error(e))
                }
            }
        }
    }
}

/// Content type for a local file, by extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "ppt" => "application/vnd.ms-powerpoint",
        "txt" => "text/plain",
        "md" => "text/markdown",
        _ => "application/octet-stream",
    }
}
