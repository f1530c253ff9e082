//! The aggregated JSON index.
//!
//! The index is a JSON array of `[relativePath, hash]` pairs, one per image
//! under the asset root, in filesystem enumeration order:
//!
//! ```json
//! [["/images/samples/test-image-3.jpeg","LmQvL5o#?wjFtRt8ofWA%gV@M_j["],
//!  ["/images/samples/test-image-2.jpeg","L9SgUN9S~H~Go;Wlj2xc^a$_ES5F"]]
//! ```
//!
//! Rebuilding is all-or-nothing. Orphaned side-cars are pruned first, then
//! every image must have a side-car; a single missing one fails the rebuild
//! and leaves any existing index file untouched. The file is written to a
//! temporary sibling and renamed into place, so readers never observe a
//! half-written index.

use crate::classify::{PathClassifier, sidecar_path_for};
use crate::encoder::HashEncoder;
use crate::scan::find_images;
use crate::sync::Synchronizer;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Side-car missing for {0}")]
    SidecarMissing(PathBuf),
}

/// One `[relativePath, hash]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry(pub String, pub String);

impl IndexEntry {
    pub fn path(&self) -> &str {
        &self.0
    }

    pub fn hash(&self) -> &str {
        &self.1
    }
}

/// Ordered list of index entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashIndex {
    entries: Vec<IndexEntry>,
}

impl HashIndex {
    /// Pair every image under the root with its side-car content.
    ///
    /// Fails on the first image without a valid side-car. Images whose path
    /// is not valid UTF-8 are skipped with a warning.
    pub fn collect(classifier: &PathClassifier) -> Result<Self, IndexError> {
        let mut entries = Vec::new();
        for image in find_images(classifier) {
            let Some(key) = classifier.relative_key(&image) else {
                warn!(image = %image.display(), "name is not valid UTF-8, left out of the index");
                continue;
            };
            let sidecar = sidecar_path_for(&image);
            if !classifier.is_valid_sidecar(&sidecar) {
                return Err(IndexError::SidecarMissing(image));
            }
            let hash = fs::read_to_string(&sidecar)?.trim().to_string();
            entries.push(IndexEntry(key, hash));
        }
        Ok(Self { entries })
    }

    /// Read a previously written index.
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hash recorded for `key` (`/sub/a.jpg`).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.path() == key)
            .map(IndexEntry::hash)
    }

    /// Write compact JSON to `target`, atomically.
    pub fn write(&self, target: &Path) -> Result<(), IndexError> {
        let json = serde_json::to_string(self)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = temp_path(target);
        if let Err(e) = fs::write(&tmp, json).and_then(|()| fs::rename(&tmp, target)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Prune orphans, collect, and write the index to `target`.
pub fn rebuild<E: HashEncoder>(
    sync: &Synchronizer<'_, E>,
    target: &Path,
) -> Result<HashIndex, IndexError> {
    sync.prune_orphans();
    let index = HashIndex::collect(sync.classifier())?;
    index.write(target)?;
    info!(target = %target.display(), entries = index.len(), "index written");
    Ok(index)
}

/// `<dir>/.<name>.tmp`, in the same directory so the rename stays atomic.
fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.tmp"))
}
