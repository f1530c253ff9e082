//! Path classification.
//!
//! Pure predicates deciding what a path *is* as far as synchronization is
//! concerned. Nothing here mutates the filesystem and nothing returns an
//! error: a path that doesn't exist, can't be resolved, or lies outside the
//! asset root is simply "not an image" and "not a side-car".
//!
//! Containment is checked lexically after resolving `.` and `..`, so
//! `<root>/../elsewhere/a.jpg` is outside the root even though it starts
//! with the root's text. A path that is lexically outside gets one more
//! chance with its parent directory canonicalized, which maps symlinked
//! aliases of the root (`/tmp/x` vs `/private/tmp/x`) onto the root.

use crate::config::Settings;
use crate::extensions::{ExtensionSet, SIDECAR_EXTENSION};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// Side-car path for an image: `a.jpg` → `a.jpg.hash`.
pub fn sidecar_path_for(image: &Path) -> PathBuf {
    let mut name = OsString::from(image.as_os_str());
    name.push(".");
    name.push(SIDECAR_EXTENSION);
    PathBuf::from(name)
}

/// Image path for a side-car: `a.jpg.hash` → `a.jpg`.
///
/// Paths without the side-car extension are returned unchanged.
pub fn image_path_for(sidecar: &Path) -> PathBuf {
    if has_sidecar_extension(sidecar) {
        sidecar.with_extension("")
    } else {
        sidecar.to_path_buf()
    }
}

/// Whether the last extension is exactly `hash`.
pub fn has_sidecar_extension(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == SIDECAR_EXTENSION)
}

/// Classifies paths against one asset root and extension set.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    root: PathBuf,
    extensions: ExtensionSet,
}

impl PathClassifier {
    pub fn new(settings: &Settings) -> Self {
        Self {
            root: normalize(&settings.asset_root),
            extensions: settings.extensions.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    /// Absolute, lexically normalized form of `path`.
    ///
    /// Relative paths are taken from the working directory. When the result
    /// is not under the root but its parent directory canonicalizes to a
    /// place that is, the canonical form is returned instead. `None` only
    /// when the path is empty or the working directory is unavailable.
    pub fn resolve(&self, path: &Path) -> Option<PathBuf> {
        let lexical = normalize(&std::path::absolute(path).ok()?);
        if lexical.starts_with(&self.root) {
            return Some(lexical);
        }
        let canonical = lexical
            .parent()
            .and_then(|parent| parent.canonicalize().ok())
            .zip(lexical.file_name())
            .map(|(parent, name)| parent.join(name))
            .filter(|p| p.starts_with(&self.root));
        Some(canonical.unwrap_or(lexical))
    }

    /// Whether `path` resolves to the asset root or somewhere below it.
    /// Does not touch the filesystem.
    pub fn is_under_root(&self, path: &Path) -> bool {
        self.resolve(path).is_some_and(|p| p.starts_with(&self.root))
    }

    /// Existing file, configured extension (any case), under the asset root.
    pub fn is_in_scope_image(&self, path: &Path) -> bool {
        self.resolve(path).is_some_and(|p| {
            p.starts_with(&self.root) && self.extensions.matches(&p) && p.is_file()
        })
    }

    /// Existing file, exactly the `.hash` extension, under the asset root.
    pub fn is_valid_sidecar(&self, path: &Path) -> bool {
        self.resolve(path)
            .is_some_and(|p| p.starts_with(&self.root) && has_sidecar_extension(&p) && p.is_file())
    }

    /// Index key for `path`: relative to the root, `/`-separated, with a
    /// leading `/` (`<root>/images/a.jpg` → `/images/a.jpg`).
    ///
    /// `None` outside the root, and for names that are not valid UTF-8:
    /// those have no faithful JSON key.
    pub fn relative_key(&self, path: &Path) -> Option<String> {
        let resolved = self.resolve(path)?;
        let relative = resolved.strip_prefix(&self.root).ok()?;
        let mut key = String::new();
        for component in relative.components() {
            key.push('/');
            key.push_str(component.as_os_str().to_str()?);
        }
        if key.is_empty() {
            key.push('/');
        }
        Some(key)
    }
}

/// Resolve `.` and `..` without consulting the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root.
                if !matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir | Component::Prefix(_))
                ) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
