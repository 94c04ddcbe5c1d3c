//! Bulk folder sync
//!
//! Walks the configured category folders under `sync.root` and uploads their
//! files:
//!
//! 1. Make sure the bucket exists
//! 2. Plain folders: upload every file under the folder's prefix
//! 3. Tier folders: skip files already stored under either language prefix,
//!    classify the rest and upload under `{tier}-{language}`
//! 4. List each destination prefix for verification
//!
//! A failed upload is recorded and the pass moves on to the next file.

use crate::config::SyncConfig;
use crate::extract::SampleLimits;
use crate::language::classify_file_blocking;
use crate::metrics;
use crate::router::{tier_prefix, DestinationKey, LanguageLabel};
use crate::s3::{content_type_for, ObjectStore, StorageError};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

pub mod policy;

/// Sync errors that stop the whole pass
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to prepare bucket '{bucket}': {source}")]
    Bucket {
        bucket: String,
        #[source]
        source: StorageError,
    },
}

/// A file that could not be uploaded
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub file: String,
    pub key: String,
    pub error: String,
}

/// Outcome of syncing one plain folder
#[derive(Debug, Clone, Default)]
pub struct FolderReport {
    pub folder: String,
    pub prefix: String,
    /// Folder absent or without files
    pub skipped: bool,
    pub attempted: usize,
    pub uploaded: usize,
    pub failures: Vec<FileFailure>,
}

/// Outcome of syncing one tier folder
#[derive(Debug, Clone, Default)]
pub struct TierReport {
    pub folder: String,
    pub skipped: bool,
    /// Files left alone because their name is already stored
    pub already_present: usize,
    pub attempted: usize,
    pub spanish: usize,
    pub english: usize,
    pub fallbacks: usize,
    pub failures: Vec<FileFailure>,
    /// Remote listing failed; nothing in the folder was touched
    pub listing_error: Option<String>,
}

impl TierReport {
    pub fn uploaded(&self) -> usize {
        self.spanish + self.english
    }
}

/// Keys under one prefix, trimmed for display
#[derive(Debug, Clone)]
pub struct PrefixListing {
    pub prefix: String,
    pub total: usize,
    pub preview: Vec<String>,
    pub error: Option<String>,
}

/// Everything one pass did
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub bucket: String,
    pub bucket_created: bool,
    pub folders: Vec<FolderReport>,
    pub tiers: Vec<TierReport>,
    pub listings: Vec<PrefixListing>,
}

impl SyncSummary {
    pub fn total_uploaded(&self) -> usize {
        self.folders.iter().map(|f| f.uploaded).sum::<usize>()
            + self.tiers.iter().map(TierReport::uploaded).sum::<usize>()
    }

    pub fn total_spanish(&self) -> usize {
        self.tiers.iter().map(|t| t.spanish).sum()
    }

    pub fn total_english(&self) -> usize {
        self.tiers.iter().map(|t| t.english).sum()
    }

    pub fn total_fallbacks(&self) -> usize {
        self.tiers.iter().map(|t| t.fallbacks).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileFailure> {
        self.folders
            .iter()
            .flat_map(|f| f.failures.iter())
            .chain(self.tiers.iter().flat_map(|t| t.failures.iter()))
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(70);

        for folder in &self.folders {
            if folder.skipped {
                writeln!(f, "Folder '{}/': nothing to upload", folder.folder)?;
            } else {
                writeln!(
                    f,
                    "Folder '{}/' -> {}/: uploaded {}/{} file(s)",
                    folder.folder, folder.prefix, folder.uploaded, folder.attempted
                )?;
            }
        }
        for tier in &self.tiers {
            if let Some(ref e) = tier.listing_error {
                writeln!(f, "Tier folder '{}/': skipped, listing failed: {}", tier.folder, e)?;
            } else if tier.skipped {
                writeln!(f, "Tier folder '{}/': nothing to upload", tier.folder)?;
            } else {
                writeln!(
                    f,
                    "Tier folder '{}/': uploaded {} file(s): {} Spanish, {} English ({} already present)",
                    tier.folder,
                    tier.uploaded(),
                    tier.spanish,
                    tier.english,
                    tier.already_present
                )?;
            }
        }

        writeln!(f, "\n{}", rule)?;
        writeln!(f, "UPLOAD SUMMARY")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "   Total files uploaded: {}", self.total_uploaded())?;
        writeln!(f, "   Spanish files: {}", self.total_spanish())?;
        writeln!(f, "   English files: {}", self.total_english())?;
        writeln!(f, "   Language fallbacks: {}", self.total_fallbacks())?;

        let failures: Vec<_> = self.failures().collect();
        if !failures.is_empty() {
            writeln!(f, "   Failed uploads: {}", failures.len())?;
            for failure in failures {
                writeln!(f, "      x {} -> {}: {}", failure.file, failure.key, failure.error)?;
            }
        }

        writeln!(f, "\nVerifying uploads in bucket '{}':", self.bucket)?;
        for listing in &self.listings {
            if let Some(ref e) = listing.error {
                writeln!(f, "\n   {}/ (listing failed: {})", listing.prefix, e)?;
                continue;
            }
            writeln!(f, "\n   {}/ ({} files)", listing.prefix, listing.total)?;
            for key in &listing.preview {
                writeln!(f, "      - {}", key)?;
            }
            if listing.total > listing.preview.len() {
                writeln!(f, "      ... and {} more", listing.total - listing.preview.len())?;
            }
        }
        writeln!(f, "\n{}", rule)
    }
}

/// Local files eligible for upload, sorted by name.
///
/// Returns `None` when the folder does not exist. Only regular files with an
/// extension are considered; dotfiles are ignored.
pub fn list_local_files(folder: &Path) -> std::io::Result<Option<Vec<PathBuf>>> {
    if !folder.is_dir() {
        return Ok(None);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || !name.contains('.') {
            continue;
        }
        files.push(entry.path());
    }
    files.sort();
    Ok(Some(files))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Bulk sync driver
pub struct SyncDriver<'a> {
    store: &'a dyn ObjectStore,
    config: &'a SyncConfig,
    limits: SampleLimits,
}

impl<'a> SyncDriver<'a> {
    pub fn new(store: &'a dyn ObjectStore, config: &'a SyncConfig, limits: SampleLimits) -> Self {
        Self {
            store,
            config,
            limits,
        }
    }

    /// Run one full pass
    pub async fn run(&self) -> Result<SyncSummary, SyncError> {
        let bucket = self.store.bucket().to_string();
        info!(bucket = %bucket, root = %self.config.root.display(), "Starting sync");

        let bucket_created =
            self.store
                .ensure_bucket()
                .await
                .map_err(|source| SyncError::Bucket {
                    bucket: bucket.clone(),
                    source,
                })?;
        if bucket_created {
            info!(bucket = %bucket, "Bucket created");
        } else {
            info!(bucket = %bucket, "Bucket already exists");
        }

        let mut summary = SyncSummary {
            bucket,
            bucket_created,
            ..Default::default()
        };

        for (folder, prefix) in &self.config.folders {
            summary.folders.push(self.sync_folder(folder, prefix).await);
        }

        for tier in &self.config.tier_folders {
            summary.tiers.push(self.sync_tier_folder(tier).await);
        }

        summary.listings = self.verify().await;
        Ok(summary)
    }

    /// Upload every file of a plain folder under `prefix`
    pub async fn sync_folder(&self, folder: &str, prefix: &str) -> FolderReport {
        let mut report = FolderReport {
            folder: folder.to_string(),
            prefix: prefix.to_string(),
            ..Default::default()
        };

        let Some(files) = self.local_files(folder) else {
            report.skipped = true;
            return report;
        };

        info!(folder = %folder, prefix = %prefix, files = files.len(), "Processing folder");

        for path in files {
            report.attempted += 1;
            let key = DestinationKey::new(prefix, file_name(&path));
            match self.upload(&path, &key).await {
                Ok(()) => report.uploaded += 1,
                Err(failure) => report.failures.push(failure),
            }
        }

        info!(
            folder = %folder,
            uploaded = report.uploaded,
            attempted = report.attempted,
            "Folder done"
        );
        report
    }

    /// Upload the not-yet-stored files of a tier folder, routed by language
    pub async fn sync_tier_folder(&self, tier: &str) -> TierReport {
        let mut report = TierReport {
            folder: tier.to_string(),
            ..Default::default()
        };

        let Some(files) = self.local_files(tier) else {
            report.skipped = true;
            return report;
        };

        let remote = match policy::remote_filenames(self.store, tier).await {
            Ok(remote) => remote,
            Err(e) => {
                error!(folder = %tier, error = %e, "Failed to list stored files, skipping tier");
                report.listing_error = Some(e.to_string());
                return report;
            }
        };

        let total = files.len();
        let unseen = policy::filter_unseen(files, &remote);
        report.already_present = total - unseen.len();

        info!(
            folder = %tier,
            unseen = unseen.len(),
            already_present = report.already_present,
            "Processing tier folder"
        );

        for path in unseen {
            report.attempted += 1;
            let classification = classify_file_blocking(path.clone(), self.limits).await;
            if classification.is_fallback() {
                report.fallbacks += 1;
            }

            let prefix = tier_prefix(tier, classification.language);
            let key = DestinationKey::new(prefix, file_name(&path));
            match self.upload(&path, &key).await {
                Ok(()) => match classification.language {
                    LanguageLabel::Spanish => report.spanish += 1,
                    LanguageLabel::English => report.english += 1,
                },
                Err(failure) => report.failures.push(failure),
            }
        }

        info!(
            folder = %tier,
            spanish = report.spanish,
            english = report.english,
            "Tier folder done"
        );
        report
    }

    /// List every destination prefix this configuration writes to
    pub async fn verify(&self) -> Vec<PrefixListing> {
        let mut prefixes: Vec<String> = self.config.folders.values().cloned().collect();
        for tier in &self.config.tier_folders {
            prefixes.extend(LanguageLabel::ALL.iter().map(|l| tier_prefix(tier, *l)));
        }

        let mut listings = Vec::with_capacity(prefixes.len());
        for prefix in prefixes {
            let listing = match self.store.list_keys(&format!("{}/", prefix)).await {
                Ok(keys) => PrefixListing {
                    prefix,
                    total: keys.len(),
                    preview: keys.into_iter().take(self.config.preview_limit).collect(),
                    error: None,
                },
                Err(e) => PrefixListing {
                    prefix,
                    total: 0,
                    preview: Vec::new(),
                    error: Some(e.to_string()),
                },
            };
            listings.push(listing);
        }
        listings
    }

    fn local_files(&self, folder: &str) -> Option<Vec<PathBuf>> {
        let path = self.config.root.join(folder);
        match list_local_files(&path) {
            Ok(Some(files)) if !files.is_empty() => Some(files),
            Ok(Some(_)) => {
                warn!(folder = %path.display(), "No files found in folder, skipping");
                None
            }
            Ok(None) => {
                warn!(folder = %path.display(), "Folder not found, skipping");
                None
            }
            Err(e) => {
                warn!(folder = %path.display(), error = %e, "Failed to read folder, skipping");
                None
            }
        }
    }

    async fn upload(&self, path: &Path, key: &DestinationKey) -> Result<(), FileFailure> {
        let key_str = key.to_string();
        match self
            .store
            .put_file(path, &key_str, Some(content_type_for(path)))
            .await
        {
            Ok(()) => {
                metrics::record_upload_success(key.prefix());
                info!(
                    file = %key.filename(),
                    key = %key_str,
                    bucket = %self.store.bucket(),
                    "Uploaded"
                );
                Ok(())
            }
            Err(e) => {
                metrics::record_upload_failure(key.prefix());
                error!(file = %key.filename(), key = %key_str, error = %e, "Failed to upload");
                Err(FileFailure {
                    file: key.filename().to_string(),
                    key: key_str,
                    error: e.to_string(),
                })
            }
        }
    }
}
