//! S3 credential resolution
//!
//! Credentials are taken from the first source that provides them:
//!
//! 1. `storage.access_key` / `storage.secret_key` in the configuration file
//! 2. `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` (+ `AWS_SESSION_TOKEN`)
//! 3. Nothing, in which case the AWS SDK default provider chain is used
//!
//! A configuration that sets only one half of a key pair is rejected rather
//! than silently falling through to the next source.

use crate::config::StorageConfig;
use aws_credential_types::Credentials;
use thiserror::Error;

/// Provider name attached to credentials built here
const PROVIDER_NAME: &str = "kb-uploadr";

/// Credential loading errors
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

/// Credential sources
pub struct CredentialsProvider;

impl CredentialsProvider {
    /// Resolve explicit credentials for a storage configuration.
    ///
    /// Returns `Ok(None)` when neither the configuration nor the environment
    /// carries a key pair.
    pub fn resolve(config: &StorageConfig) -> Result<Option<Credentials>, CredentialsError> {
        if let Some(creds) = Self::from_config(config)? {
            return Ok(Some(creds));
        }
        Ok(Self::from_env())
    }

    /// Credentials from the configuration file
    pub fn from_config(config: &StorageConfig) -> Result<Option<Credentials>, CredentialsError> {
        match (&config.access_key, &config.secret_key) {
            (Some(access), Some(secret)) => Ok(Some(Credentials::new(
                access.clone(),
                secret.clone(),
                None,
                None,
                PROVIDER_NAME,
            ))),
            (None, None) => Ok(None),
            (Some(_), None) => Err(CredentialsError::MissingCredentials(
                "secret_key not set in config".into(),
            )),
            (None, Some(_)) => Err(CredentialsError::MissingCredentials(
                "access_key not set in config".into(),
            )),
        }
    }

    /// Credentials from `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
    pub fn from_env() -> Option<Credentials> {
        let access_key = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
        let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Some(Credentials::new(
            access_key,
            secret_key,
            session_token,
            None,
            PROVIDER_NAME,
        ))
    }
}
