//! Shared test utilities.
//!
//! Builds throwaway asset trees in a temp directory together with the
//! validated [`Settings`] pointing at them.
//!
//! ```text
//! <tmp>/
//! ├── assets/          # asset root (canonicalized in Settings)
//! └── out/hashmap.json # index target
//! ```

use crate::config::{HashMapConfig, Settings};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Validated settings for `root` with the given extensions. The index
/// target sits next to the root so tests never write to the working dir.
pub fn settings_for(root: &Path, extensions: &[&str]) -> Settings {
    let target = root
        .parent()
        .unwrap_or(root)
        .join("out")
        .join("hashmap.json");
    HashMapConfig {
        assets: Some(root.to_path_buf()),
        extensions: extensions.iter().map(|s| s.to_string()).collect(),
        target,
        ..HashMapConfig::default()
    }
    .validate()
    .unwrap()
}

/// Write `content` to `path`, creating parent directories.
pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// An asset root in a temp directory.
pub struct Fixture {
    _tmp: TempDir,
    pub settings: Settings,
}

impl Fixture {
    /// Empty asset root tracking `extensions`.
    pub fn new(extensions: &[&str]) -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("assets");
        fs::create_dir_all(&root).unwrap();
        let settings = settings_for(&root, extensions);
        Self { _tmp: tmp, settings }
    }

    /// Asset root with every default extension and the given files.
    pub fn with_files(files: &[&str]) -> Self {
        let fixture = Self::new(&["jpg", "jpeg", "png", "bmp", "webp"]);
        for file in files {
            fixture.add(file, "image bytes");
        }
        fixture
    }

    pub fn root(&self) -> &Path {
        &self.settings.asset_root
    }

    /// Absolute path of `rel` under the root.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// Create `rel` with `content` and return its absolute path.
    pub fn add(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path(rel);
        write_file(&path, content);
        path
    }

    /// Content of `rel`, or `None` if it doesn't exist.
    pub fn read(&self, rel: &str) -> Option<String> {
        fs::read_to_string(self.path(rel)).ok()
    }

    /// Every `.hash` file under the root, relative and sorted.
    pub fn sidecars(&self) -> Vec<String> {
        let mut found: Vec<String> = walkdir::WalkDir::new(self.root())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|x| x == "hash"))
            .map(|e| {
                e.path()
                    .strip_prefix(self.root())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        found.sort();
        found
    }
}
