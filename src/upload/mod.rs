//! Upload module
//!
//! Core of the upload service: given one file and a category, work out the
//! destination key and hand back a presigned PUT URL for it. The bytes never
//! go through this process on their way to storage; the caller uploads them
//! directly with the returned URL.

use crate::config::Config;
use crate::extract::SampleLimits;
use crate::language::classify_file_blocking;
use crate::metrics;
use crate::router::{Category, DestinationKey};
use crate::s3::{ObjectStore, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

pub mod push;
pub mod temp_file;

use temp_file::TempFileUpload;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Missing form field: {0}")]
    MissingField(&'static str),

    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),

    #[error("Malformed upload request: {0}")]
    Malformed(String),

    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("Failed to authorize upload: {0}")]
    Authorization(#[source] StorageError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Upload service returned {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Transfer failed: {0}")]
    Transfer(String),
}

/// Presigned write access for one destination key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteAuthorization {
    pub upload_url: String,
    pub key: String,
    pub expires_at: DateTime<Utc>,
    /// Detected language, tiered categories only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Final path component of a client-supplied filename.
///
/// Both `/` and `\` separators are stripped. Returns `None` when nothing
/// usable is left.
pub fn sanitize_filename(raw: &str) -> Option<&str> {
    let name = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(raw).trim();
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

/// Issues write authorizations
pub struct UploadService {
    store: Arc<dyn ObjectStore>,
    expiry: Duration,
    limits: SampleLimits,
}

impl UploadService {
    pub fn new(store: Arc<dyn ObjectStore>, expiry: Duration, limits: SampleLimits) -> Self {
        Self {
            store,
            expiry,
            limits,
        }
    }

    pub fn from_config(store: Arc<dyn ObjectStore>, config: &Config) -> Self {
        Self::new(
            store,
            Duration::from_secs(config.storage.presign_expiry_secs),
            SampleLimits::from(&config.language),
        )
    }

    /// Route one received file and presign a PUT for its key.
    ///
    /// The bytes are staged in a temp file for sampling; the file is gone
    /// by the time this returns, whatever the outcome.
    #[tracing::instrument(
        name = "upload.authorize",
        skip(self, data, content_type),
        fields(size = data.len())
    )]
    pub async fn authorize(
        &self,
        filename: &str,
        category: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<WriteAuthorization, UploadError> {
        let filename = sanitize_filename(filename)
            .ok_or_else(|| UploadError::InvalidFilename(filename.to_string()))?;
        let category = Category::from_form_value(category);

        let extension = Path::new(filename).extension().and_then(|e| e.to_str());
        let temp = TempFileUpload::from_bytes(data, extension)?;

        let language = if category.requires_language() {
            let classification =
                classify_file_blocking(temp.path().to_path_buf(), self.limits).await;
            Some(classification.language)
        } else {
            None
        };

        let key = DestinationKey::for_category(category, language, filename).to_string();
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.expiry).unwrap_or_else(|_| chrono::Duration::hours(1));

        let result = self.store.presign_put(&key, self.expiry, content_type).await;
        drop(temp);

        match result {
            Ok(upload_url) => {
                metrics::record_authorization(true);
                info!(key = %key, language = ?language, "Upload authorized");
                Ok(WriteAuthorization {
                    upload_url,
                    key,
                    expires_at,
                    language: language.map(|l| l.to_string()),
                })
            }
            Err(e) => {
                metrics::record_authorization(false);
                error!(key = %key, error = %e, "Failed to presign upload");
                Err(UploadError::Authorization(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::MemoryStore;

    fn service(store: Arc<MemoryStore>) -> UploadService {
        UploadService::new(store, Duration::from_secs(3600), SampleLimits::default())
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("x.pdf"), Some("x.pdf"));
        assert_eq!(sanitize_filename("../../etc/passwd"), Some("passwd"));
        assert_eq!(sanitize_filename("C:\\Users\\ana\\guia.docx"), Some("guia.docx"));
        assert_eq!(sanitize_filename("folder/"), None);
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename("   "), None);
    }

    #[tokio::test]
    async fn test_authorize_personality_key() {
        let store = Arc::new(MemoryStore::new("kb"));
        let auth = service(store)
            .authorize("x.pdf", "personality", b"anything", Some("application/pdf"))
            .await
            .unwrap();

        assert_eq!(auth.key, "personality/x.pdf");
        assert!(auth.upload_url.starts_with("memory://kb/personality/x.pdf"));
        assert!(auth.language.is_none());
        assert!(auth.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn test_authorize_unknown_category_goes_to_others() {
        let store = Arc::new(MemoryStore::new("kb"));
        let auth = service(store)
            .authorize("notes.docx", "marketing", b"", None)
            .await
            .unwrap();
        assert_eq!(auth.key, "others/notes.docx");
    }

    #[tokio::test]
    async fn test_authorize_tier_uses_detected_language() {
        let store = Arc::new(MemoryStore::new("kb"));
        let text = "La planificación financiera es fundamental para alcanzar la libertad \
            económica. Es importante ahorrar una parte de los ingresos cada mes.";
        let auth = service(store)
            .authorize("report.txt", "Tier1", text.as_bytes(), Some("text/plain"))
            .await
            .unwrap();

        assert_eq!(auth.key, "Tier 1-spanish/report.txt");
        assert_eq!(auth.language.as_deref(), Some("spanish"));
    }

    #[tokio::test]
    async fn test_authorize_unreadable_tier_file_falls_back() {
        let store = Arc::new(MemoryStore::new("kb"));
        let auth = service(store)
            .authorize("scan.pdf", "Tier2", b"not a pdf", None)
            .await
            .unwrap();
        assert_eq!(auth.key, "Tier 2-english/scan.pdf");
    }

    #[tokio::test]
    async fn test_authorize_presign_failure() {
        let store = Arc::new(MemoryStore::new("kb"));
        store.disable_presign();

        let result = service(store)
            .authorize("x.pdf", "personality", b"data", None)
            .await;
        assert!(matches!(result, Err(UploadError::Authorization(_))));
    }

    #[tokio::test]
    async fn test_authorize_rejects_empty_filename() {
        let store = Arc::new(MemoryStore::new("kb"));
        let result = service(store)
            .authorize("dir/", "personality", b"data", None)
            .await;
        assert!(matches!(result, Err(UploadError::InvalidFilename(_))));
    }

    #[test]
    fn test_response_field_names() {
        let auth = WriteAuthorization {
            upload_url: "https://example/put".into(),
            key: "personality/x.pdf".into(),
            expires_at: Utc::now(),
            language: None,
        };
        let json = serde_json::to_value(&auth).unwrap();
        assert!(json.get("uploadUrl").is_some());
        assert!(json.get("key").is_some());
        assert!(json.get("expiresAt").is_some());
        assert!(json.get("language").is_none());
    }
}
