//! Command-line upload client
//!
//! Does what the browser form does, one file at a time: ask the service for a
//! write authorization, then PUT the bytes to the returned URL.

use super::{UploadError, WriteAuthorization};
use crate::s3::content_type_for;
use reqwest::multipart::{Form, Part};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// One file stored through the service
#[derive(Debug, Clone)]
pub struct PushedFile {
    pub path: PathBuf,
    pub key: String,
}

/// Per-file outcome of a push run
#[derive(Debug, Default)]
pub struct PushReport {
    pub succeeded: Vec<PushedFile>,
    pub failed: Vec<(PathBuf, String)>,
}

impl fmt::Display for PushReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in &self.succeeded {
            writeln!(f, "uploaded {} -> {}", file.path.display(), file.key)?;
        }
        for (path, e) in &self.failed {
            writeln!(f, "failed   {}: {}", path.display(), e)?;
        }
        write!(
            f,
            "{} succeeded, {} failed",
            self.succeeded.len(),
            self.failed.len()
        )
    }
}

/// HTTP client for a running upload service
pub struct PushClient {
    http: reqwest::Client,
    server: String,
}

impl PushClient {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            server: server.into().trim_end_matches('/').to_string(),
        }
    }

    /// Request an authorization for `path` under `category`
    pub async fn request_authorization(
        &self,
        path: &Path,
        category: &str,
        data: Vec<u8>,
    ) -> Result<WriteAuthorization, UploadError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| UploadError::InvalidFilename(path.display().to_string()))?;

        let part = Part::bytes(data)
            .file_name(filename)
            .mime_str(content_type_for(path))
            .map_err(|e| UploadError::Malformed(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("type", category.to_string());

        let response = self
            .http
            .post(format!("{}/api/get-upload-url", self.server))
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Transfer(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Service {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<WriteAuthorization>()
            .await
            .map_err(|e| UploadError::Malformed(e.to_string()))
    }

    /// Authorize and upload a single file
    pub async fn push_file(&self, path: &Path, category: &str) -> Result<PushedFile, UploadError> {
        let data = tokio::fs::read(path).await?;
        let auth = self
            .request_authorization(path, category, data.clone())
            .await?;

        let response = self
            .http
            .put(&auth.upload_url)
            .header(reqwest::header::CONTENT_TYPE, content_type_for(path))
            .body(data)
            .send()
            .await
            .map_err(|e| UploadError::Transfer(e.to_string()))?;

        if !response.status().is_success() {
            return Err(UploadError::Transfer(format!(
                "storage rejected upload with status {}",
                response.status()
            )));
        }

        Ok(PushedFile {
            path: path.to_path_buf(),
            key: auth.key,
        })
    }

    /// Push every file, continuing past failures
    pub async fn push_all(&self, files: &[PathBuf], category: &str) -> PushReport {
        let mut report = PushReport::default();
        for path in files {
            match self.push_file(path, category).await {
                Ok(pushed) => {
                    info!(file = %path.display(), key = %pushed.key, "Pushed");
                    report.succeeded.push(pushed);
                }
                Err(e) => {
                    error!(file = %path.display(), error = %e, "Push failed");
                    report.failed.push((path.clone(), e.to_string()));
                }
            }
        }
        report
    }
}
