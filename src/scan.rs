//! Asset tree enumeration.
//!
//! Walks the asset root and yields image files and side-car files in the
//! order the filesystem reports them. Results are deliberately not sorted:
//! the index preserves enumeration order.
//!
//! Symlinked directories are not followed (no cycles); symlinked files count
//! if their target is a file, matching the classifier. Entries that can't be
//! read are skipped with a warning rather than failing the whole walk.

use crate::classify::{PathClassifier, has_sidecar_extension};
use std::path::PathBuf;
use tracing::warn;
use walkdir::WalkDir;

/// Every file under the root with a configured image extension.
pub fn find_images(classifier: &PathClassifier) -> Vec<PathBuf> {
    let extensions = classifier.extensions();
    walk_files(classifier)
        .filter(|p| extensions.matches(p))
        .collect()
}

/// Every file under the root with the side-car extension.
pub fn find_sidecars(classifier: &PathClassifier) -> Vec<PathBuf> {
    walk_files(classifier)
        .filter(|p| has_sidecar_extension(p))
        .collect()
}

fn walk_files(classifier: &PathClassifier) -> impl Iterator<Item = PathBuf> + '_ {
    files_under(classifier.root().to_path_buf())
}

/// Every file below `dir`, in enumeration order. Also used by the watcher
/// when a whole directory shows up in a single event.
pub fn files_under(dir: PathBuf) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .map(|e| e.into_path())
        .filter(|p| p.is_file())
}
