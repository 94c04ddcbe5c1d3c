//! Skip-if-present policy for tier folders
//!
//! Remote keys under every language prefix of a tier are listed once per
//! pass. A local file whose name already appears under *any* of them is left
//! alone: it is neither re-uploaded nor re-classified, even if its language
//! would be detected differently today. A renamed file is a new name and is
//! classified again.
//!
//! The check is a read-then-write without any locking. Two concurrent passes
//! may both upload the same file; the second upload overwrites the first under
//! the same key.

use crate::router::{filename_of, tier_prefix, LanguageLabel};
use crate::s3::{ObjectStore, StorageError};
use std::collections::HashSet;
use std::path::PathBuf;

/// Filenames already stored under any language prefix of `tier_name`
pub async fn remote_filenames(
    store: &dyn ObjectStore,
    tier_name: &str,
) -> Result<HashSet<String>, StorageError> {
    let mut names = HashSet::new();
    for language in LanguageLabel::ALL {
        let prefix = format!("{}/", tier_prefix(tier_name, language));
        for key in store.list_keys(&prefix).await? {
            names.insert(filename_of(&key).to_string());
        }
    }
    Ok(names)
}

/// Local files whose names are not in `remote`, order preserved
pub fn filter_unseen(files: Vec<PathBuf>, remote: &HashSet<String>) -> Vec<PathBuf> {
    files
        .into_iter()
        .filter(|path| {
            path.file_name()
                .map(|name| !remote.contains(name.to_string_lossy().as_ref()))
                .unwrap_or(false)
        })
        .collect()
}
