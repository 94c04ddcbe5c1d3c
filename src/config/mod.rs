//! Configuration module for KB Uploadr
//!
//! Handles loading and parsing of the YAML configuration file with support for
//! environment variable expansion and validation. A single [`Config`] is built
//! at process start and passed by reference to every component.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// # Examples
///
/// ```ignore
/// std::env::set_var("BUCKET_NAME", "kb-docs");
/// assert_eq!(expand_env_vars("${BUCKET_NAME}"), "kb-docs");
/// assert_eq!(expand_env_vars("${MISSING:-eu-west-1}"), "eu-west-1");
/// ```
pub(crate) fn expand_env_vars(s: &str) -> String {
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") {
        Ok(re) => re,
        Err(_) => return s.to_string(),
    };
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let Some(full_match) = cap.get(0) else {
            continue;
        };
        let var_name = cap.get(1).map(|m| m.as_str()).unwrap_or_default();

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

/// Longest validity SigV4 accepts for a presigned URL
pub const MAX_PRESIGN_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub language: LanguageConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Build a configuration with defaults everywhere except the storage target.
    pub fn for_bucket(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            storage: StorageConfig {
                bucket: bucket.into(),
                region: region.into(),
                endpoint: None,
                access_key: None,
                secret_key: None,
                presign_expiry_secs: default_presign_expiry(),
            },
            server: ServerConfig::default(),
            sync: SyncConfig::default(),
            language: LanguageConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.bucket must not be empty".into(),
            ));
        }

        if self.storage.region.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.region must not be empty".into(),
            ));
        }

        if self.storage.presign_expiry_secs == 0
            || self.storage.presign_expiry_secs > MAX_PRESIGN_EXPIRY_SECS
        {
            return Err(ConfigError::ValidationError(format!(
                "storage.presign_expiry_secs must be between 1 and {} (7 days)",
                MAX_PRESIGN_EXPIRY_SECS
            )));
        }

        if let Some(ref endpoint) = self.storage.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid storage endpoint '{}': must start with http:// or https://",
                    endpoint
                )));
            }
        }

        if self.sync.preview_limit == 0 {
            return Err(ConfigError::ValidationError(
                "sync.preview_limit must be greater than zero".into(),
            ));
        }

        for tier in &self.sync.tier_folders {
            if self.sync.folders.contains_key(tier) {
                return Err(ConfigError::ValidationError(format!(
                    "Folder '{}' is configured both as a plain folder and a tier folder",
                    tier
                )));
            }
        }

        if self.language.sample_chars == 0 || self.language.pdf_pages == 0 {
            return Err(ConfigError::ValidationError(
                "language.sample_chars and language.pdf_pages must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// S3-compatible endpoint (MinIO, LocalStack, ...). Forces path-style addressing.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default = "default_presign_expiry")]
    pub presign_expiry_secs: u64,
}

fn default_presign_expiry() -> u64 {
    3600
}

/// Upload service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_cors_any")]
    pub cors_allow_any_origin: bool,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            cors_allow_any_origin: default_cors_any(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_cors_any() -> bool {
    true
}

fn default_max_upload_bytes() -> usize {
    52428800 // 50MB
}

/// Bulk folder sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Directory containing the category folders
    #[serde(default = "default_sync_root")]
    pub root: PathBuf,
    /// Non-tiered local folder name -> destination prefix
    #[serde(default = "default_folders")]
    pub folders: BTreeMap<String, String>,
    /// Folders whose files are routed by detected language
    #[serde(default = "default_tier_folders")]
    pub tier_folders: Vec<String>,
    /// Keys shown per prefix in the verification listing
    #[serde(default = "default_preview_limit")]
    pub preview_limit: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: default_sync_root(),
            folders: default_folders(),
            tier_folders: default_tier_folders(),
            preview_limit: default_preview_limit(),
        }
    }
}

fn default_sync_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_folders() -> BTreeMap<String, String> {
    ["personality", "instructions"]
        .into_iter()
        .map(|name| (name.to_string(), name.to_string()))
        .collect()
}

fn default_tier_folders() -> Vec<String> {
    vec!["Tier 1".to_string(), "Tier 2".to_string()]
}

fn default_preview_limit() -> usize {
    5
}

/// Text sampling limits used for language identification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    #[serde(default = "default_sample_chars")]
    pub sample_chars: usize,
    #[serde(default = "default_pdf_pages")]
    pub pdf_pages: usize,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            sample_chars: default_sample_chars(),
            pdf_pages: default_pdf_pages(),
        }
    }
}

fn default_sample_chars() -> usize {
    500
}

fn default_pdf_pages() -> usize {
    4
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::for_bucket("kb", "eu-west-1");
        assert_eq!(config.storage.presign_expiry_secs, 3600);
        assert_eq!(config.sync.tier_folders, vec!["Tier 1", "Tier 2"]);
        assert_eq!(
            config.sync.folders.get("personality").map(String::as_str),
            Some("personality")
        );
        assert_eq!(config.language.sample_chars, 500);
        assert_eq!(config.language.pdf_pages, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_bucket() {
        let config = Config::for_bucket("", "eu-west-1");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_presign_expiry_bounds() {
        let mut config = Config::for_bucket("kb", "eu-west-1");

        config.storage.presign_expiry_secs = MAX_PRESIGN_EXPIRY_SECS;
        assert!(config.validate().is_ok());

        config.storage.presign_expiry_secs = MAX_PRESIGN_EXPIRY_SECS + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("storage.presign_expiry_secs"));

        config.storage.presign_expiry_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_overlapping_folders() {
        let mut config = Config::for_bucket("kb", "eu-west-1");
        config
            .sync
            .folders
            .insert("Tier 1".into(), "tier-one".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_config_validation_bad_endpoint() {
        let mut config = Config::for_bucket("kb", "eu-west-1");
        config.storage.endpoint = Some("localhost:9000".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_env_vars_default_value() {
        let expanded = expand_env_vars("${KB_UPLOADR_SURELY_UNSET_VAR:-eu-west-1}");
        assert_eq!(expanded, "eu-west-1");
    }

    #[test]
    fn test_expand_env_vars_keeps_unknown_placeholder() {
        let expanded = expand_env_vars("bucket-${KB_UPLOADR_SURELY_UNSET_VAR}");
        assert_eq!(expanded, "bucket-${KB_UPLOADR_SURELY_UNSET_VAR}");
    }
}
