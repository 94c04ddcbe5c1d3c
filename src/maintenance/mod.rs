//! Maintenance operations
//!
//! Listing and deleting stored objects by prefix or by exact key. Every
//! deletion goes through a [`Confirm`] provider first; the console provider
//! asks a human, the others exist for scripted runs and tests.

use crate::metrics;
use crate::s3::{ObjectStore, StorageError};
use std::fmt;
use std::io::{BufRead, Write};
use thiserror::Error;
use tracing::{info, warn};

/// Maintenance errors
#[derive(Error, Debug)]
pub enum MaintenanceError {
    #[error("Provide exactly one of a prefix or a key")]
    InvalidArguments,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Asks for consent before a destructive action
#[cfg_attr(test, mockall::automock)]
pub trait Confirm {
    /// `prompt` is shown verbatim; returns `true` only on an explicit yes
    fn confirm(&self, prompt: &str) -> bool;
}

/// Prompts on stdout and reads the answer from stdin. Only `yes` confirms.
#[derive(Debug, Default)]
pub struct ConsolePrompt;

impl Confirm for ConsolePrompt {
    fn confirm(&self, prompt: &str) -> bool {
        let mut stdout = std::io::stdout().lock();
        if write!(stdout, "{}", prompt).and_then(|_| stdout.flush()).is_err() {
            return false;
        }

        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_affirmative(&answer),
            Err(e) => {
                warn!(error = %e, "Failed to read confirmation");
                false
            }
        }
    }
}

/// Confirms everything (`--yes`)
#[derive(Debug, Default)]
pub struct AlwaysConfirm;

impl Confirm for AlwaysConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Declines everything
#[derive(Debug, Default)]
pub struct NeverConfirm;

impl Confirm for NeverConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

/// What a removal did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    Deleted { deleted: usize, failed: Vec<String> },
    NothingMatched(String),
    NotFound(String),
    Cancelled,
}

impl RemovalOutcome {
    pub fn deleted(&self) -> usize {
        match self {
            RemovalOutcome::Deleted { deleted, .. } => *deleted,
            _ => 0,
        }
    }
}

impl fmt::Display for RemovalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalOutcome::Deleted { deleted, failed } => {
                write!(f, "Total deleted: {} file(s)", deleted)?;
                if !failed.is_empty() {
                    write!(f, ", {} failed: {}", failed.len(), failed.join(", "))?;
                }
                Ok(())
            }
            RemovalOutcome::NothingMatched(prefix) => {
                write!(f, "No files found with prefix '{}'", prefix)
            }
            RemovalOutcome::NotFound(key) => write!(f, "File not found: {}", key),
            RemovalOutcome::Cancelled => f.write_str("Deletion cancelled"),
        }
    }
}

/// Keys under `prefix`, in key order. An empty result is logged, not an error.
pub async fn list_by_prefix(
    store: &dyn ObjectStore,
    prefix: &str,
) -> Result<Vec<String>, StorageError> {
    let keys = store.list_keys(prefix).await?;
    if keys.is_empty() {
        info!(prefix = %prefix, bucket = %store.bucket(), "No files found with prefix");
    }
    Ok(keys)
}

/// List and delete operations against one store
pub struct Maintenance<'a> {
    store: &'a dyn ObjectStore,
    confirm: &'a dyn Confirm,
}

impl<'a> Maintenance<'a> {
    pub fn new(store: &'a dyn ObjectStore, confirm: &'a dyn Confirm) -> Self {
        Self { store, confirm }
    }

    /// Delete everything under `prefix`, or the single object `key`.
    ///
    /// Exactly one of the two must be given (empty strings count as absent).
    pub async fn remove(
        &self,
        prefix: Option<&str>,
        key: Option<&str>,
    ) -> Result<RemovalOutcome, MaintenanceError> {
        let prefix = prefix.filter(|p| !p.is_empty());
        let key = key.filter(|k| !k.is_empty());

        match (prefix, key) {
            (Some(prefix), None) => self.remove_prefix(prefix).await,
            (None, Some(key)) => self.remove_key(key).await,
            _ => Err(MaintenanceError::InvalidArguments),
        }
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<RemovalOutcome, MaintenanceError> {
        let keys = self.store.list_keys(prefix).await?;
        if keys.is_empty() {
            return Ok(RemovalOutcome::NothingMatched(prefix.to_string()));
        }

        let mut prompt = format!("Found {} file(s) to delete:\n", keys.len());
        for key in &keys {
            prompt.push_str(&format!("   {}\n", key));
        }
        prompt.push_str(&format!("Delete {} files? (yes/no): ", keys.len()));

        if !self.confirm.confirm(&prompt) {
            info!(prefix = %prefix, "Deletion cancelled");
            return Ok(RemovalOutcome::Cancelled);
        }

        let mut deleted = 0;
        let mut failed = Vec::new();
        for key in keys {
            match self.store.delete_object(&key).await {
                Ok(()) => {
                    info!(key = %key, "Deleted");
                    deleted += 1;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to delete");
                    failed.push(key);
                }
            }
        }

        metrics::record_deletions(deleted);
        Ok(RemovalOutcome::Deleted { deleted, failed })
    }

    async fn remove_key(&self, key: &str) -> Result<RemovalOutcome, MaintenanceError> {
        if !self.store.object_exists(key).await? {
            warn!(key = %key, "File not found");
            return Ok(RemovalOutcome::NotFound(key.to_string()));
        }

        if !self
            .confirm
            .confirm(&format!("Delete {}? (yes/no): ", key))
        {
            info!(key = %key, "Deletion cancelled");
            return Ok(RemovalOutcome::Cancelled);
        }

        self.store.delete_object(key).await?;
        metrics::record_deletions(1);
        info!(key = %key, "Deleted");
        Ok(RemovalOutcome::Deleted {
            deleted: 1,
            failed: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::MemoryStore;

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new("kb");
        store.insert("Tier 1-spanish/a.pdf", "a");
        store.insert("Tier 1-spanish/b.pdf", "b");
        store.insert("personality/p.pdf", "p");
        store
    }

    fn never_asked() -> MockConfirm {
        let mut confirm = MockConfirm::new();
        confirm.expect_confirm().times(0);
        confirm
    }

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("yes\n"));
        assert!(is_affirmative("  YES "));
        assert!(!is_affirmative("y"));
        assert!(!is_affirmative(""));
    }

    #[tokio::test]
    async fn test_remove_requires_exactly_one_target() {
        let store = seeded_store();
        let confirm = never_asked();
        let maintenance = Maintenance::new(&store, &confirm);

        let neither = maintenance.remove(None, None).await;
        assert!(matches!(neither, Err(MaintenanceError::InvalidArguments)));

        let both = maintenance
            .remove(Some("personality/"), Some("personality/p.pdf"))
            .await;
        assert!(matches!(both, Err(MaintenanceError::InvalidArguments)));

        let empty = maintenance.remove(Some(""), None).await;
        assert!(matches!(empty, Err(MaintenanceError::InvalidArguments)));

        assert_eq!(store.keys().len(), 3);
    }

    #[tokio::test]
    async fn test_remove_missing_key() {
        let store = seeded_store();
        let confirm = never_asked();
        let maintenance = Maintenance::new(&store, &confirm);

        let outcome = maintenance
            .remove(None, Some("personality/missing.pdf"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RemovalOutcome::NotFound("personality/missing.pdf".into())
        );
        assert_eq!(outcome.deleted(), 0);
        assert_eq!(store.keys().len(), 3);
    }

    #[tokio::test]
    async fn test_remove_key_confirmed() {
        let store = seeded_store();
        let mut confirm = MockConfirm::new();
        confirm
            .expect_confirm()
            .withf(|prompt| prompt.contains("personality/p.pdf"))
            .times(1)
            .return_const(true);
        let maintenance = Maintenance::new(&store, &confirm);

        let outcome = maintenance
            .remove(None, Some("personality/p.pdf"))
            .await
            .unwrap();
        assert_eq!(outcome.deleted(), 1);
        assert!(store.get("personality/p.pdf").is_none());
    }

    #[tokio::test]
    async fn test_remove_prefix_declined() {
        let store = seeded_store();
        let maintenance = Maintenance::new(&store, &NeverConfirm);

        let outcome = maintenance
            .remove(Some("Tier 1-spanish/"), None)
            .await
            .unwrap();
        assert_eq!(outcome, RemovalOutcome::Cancelled);
        assert_eq!(store.keys().len(), 3);
    }

    #[tokio::test]
    async fn test_remove_prefix_confirmed_counts_deletions() {
        let store = seeded_store();
        let mut confirm = MockConfirm::new();
        confirm
            .expect_confirm()
            .withf(|prompt| {
                prompt.contains("Found 2 file(s)") && prompt.contains("Tier 1-spanish/b.pdf")
            })
            .times(1)
            .return_const(true);
        let maintenance = Maintenance::new(&store, &confirm);

        let outcome = maintenance
            .remove(Some("Tier 1-spanish/"), None)
            .await
            .unwrap();
        assert_eq!(outcome.deleted(), 2);
        assert_eq!(store.keys(), vec!["personality/p.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_prefix_partial_failure() {
        let store = seeded_store();
        store.fail_deletes_of("Tier 1-spanish/a.pdf");
        let maintenance = Maintenance::new(&store, &AlwaysConfirm);

        let outcome = maintenance
            .remove(Some("Tier 1-spanish/"), None)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RemovalOutcome::Deleted {
                deleted: 1,
                failed: vec!["Tier 1-spanish/a.pdf".to_string()],
            }
        );
        assert_eq!(outcome.deleted(), 1);
        assert!(outcome.to_string().contains("1 failed"));
        assert_eq!(
            store.keys(),
            vec!["Tier 1-spanish/a.pdf".to_string(), "personality/p.pdf".to_string()]
        );
    }

    #[tokio::test]
    async fn test_remove_prefix_nothing_matched() {
        let store = seeded_store();
        let confirm = never_asked();
        let maintenance = Maintenance::new(&store, &confirm);

        let outcome = maintenance.remove(Some("Tier 2-"), None).await.unwrap();
        assert_eq!(outcome, RemovalOutcome::NothingMatched("Tier 2-".into()));
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let store = seeded_store();
        let keys = list_by_prefix(&store, "Tier 1-spanish/").await.unwrap();
        assert_eq!(keys, vec!["Tier 1-spanish/a.pdf", "Tier 1-spanish/b.pdf"]);

        let none = list_by_prefix(&store, "instructions/").await.unwrap();
        assert!(none.is_empty());
    }
}
