//! Smart folder data model and cache key derivation

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// A saved-search definition known to the file index.
///
/// The path is the identity key; the name is a display/lookup alias derived
/// from the path's base name minus extension and is not guaranteed unique
/// (collisions resolve to the first match in stored order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartFolder {
    pub name: String,
    pub path: String,
}

impl SmartFolder {
    /// Build a folder entry from its saved-search path.
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = Path::new(&path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        Self { name, path }
    }
}

/// Sort a rescanned folder list into its canonical order: lexicographic by
/// name, path as tiebreaker so snapshots are deterministic.
pub fn sort_folder_list(folders: &mut [SmartFolder]) {
    folders.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
}

/// Derived cache key for one folder's contents: a stable hash of the
/// folder's path (not its name, which is not unique), safe to use as a
/// storage identifier.
pub fn contents_cache_key(folder_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(folder_path.as_bytes());
    let hash = hasher.finalize();
    format!("contents-{}", hex::encode(&hash[..12]))
}

/// Base name of a file path, for display and fuzzy matching.
pub fn file_base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
