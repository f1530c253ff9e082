//! Allowed image extensions.
//!
//! The universe of extensions is fixed: `jpg`, `jpeg`, `png`, `bmp`, `webp`.
//! A run may narrow it down, but never widen it. Anything outside the
//! universe is rejected while the config is validated, before a single file
//! is scanned, and every offending entry is reported at once.

use crate::classify::has_sidecar_extension;
use crate::config::Violation;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Extension of side-car hash files, without the dot.
pub const SIDECAR_EXTENSION: &str = "hash";

/// One member of the fixed image extension universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageExtension {
    Jpg,
    Jpeg,
    Png,
    Bmp,
    Webp,
}

impl ImageExtension {
    pub const ALL: [ImageExtension; 5] = [
        ImageExtension::Jpg,
        ImageExtension::Jpeg,
        ImageExtension::Png,
        ImageExtension::Bmp,
        ImageExtension::Webp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ImageExtension::Jpg => "jpg",
            ImageExtension::Jpeg => "jpeg",
            ImageExtension::Png => "png",
            ImageExtension::Bmp => "bmp",
            ImageExtension::Webp => "webp",
        }
    }
}

impl fmt::Display for ImageExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageExtension {
    type Err = String;

    /// Case-insensitive; a leading dot (`.JPG`) is tolerated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches('.').to_ascii_lowercase();
        ImageExtension::ALL
            .into_iter()
            .find(|ext| ext.as_str() == normalized)
            .ok_or_else(|| s.trim().to_string())
    }
}

/// Validated, non-empty set of image extensions in configuration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSet {
    extensions: Vec<ImageExtension>,
}

impl Default for ExtensionSet {
    fn default() -> Self {
        Self {
            extensions: ImageExtension::ALL.to_vec(),
        }
    }
}

/// Split a comma-separated list such as `"jpg, png,"` into trimmed,
/// non-empty items. Used for the `--extensions` flag.
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl ExtensionSet {
    /// Validate a configured extension list against the fixed universe.
    ///
    /// Fails with one [`Violation`] naming every unknown extension, or one
    /// for an empty list. Duplicates (`jpg`, `JPG`) collapse silently. The
    /// config validator gathers this together with other fields' problems.
    pub fn validate(configured: &[String]) -> Result<Self, Violation> {
        let mut extensions = Vec::new();
        let mut rejected = Vec::new();
        for raw in configured {
            match raw.parse::<ImageExtension>() {
                Ok(ext) if !extensions.contains(&ext) => extensions.push(ext),
                Ok(_) => {}
                Err(bad) => rejected.push(bad),
            }
        }

        if !rejected.is_empty() {
            let allowed: Vec<&str> = ImageExtension::ALL.iter().map(|e| e.as_str()).collect();
            return Err(Violation::new(
                "extensions",
                format!(
                    "only {} are allowed; remove: {}",
                    allowed.join(","),
                    rejected.join(",")
                ),
            ));
        }
        if extensions.is_empty() {
            return Err(Violation::new("extensions", "list cannot be empty"));
        }
        Ok(Self { extensions })
    }

    pub fn iter(&self) -> impl Iterator<Item = ImageExtension> + '_ {
        self.extensions.iter().copied()
    }

    pub fn contains(&self, ext: ImageExtension) -> bool {
        self.extensions.contains(&ext)
    }

    /// Whether `path` carries one of the configured extensions (any case).
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse::<ImageExtension>().ok())
            .is_some_and(|ext| self.contains(ext))
    }

    /// Whether the watcher has to report `path`: a configured image or a
    /// side-car (exact `hash` extension).
    pub fn is_watched(&self, path: &Path) -> bool {
        self.matches(path) || has_sidecar_extension(path)
    }
}

impl fmt::Display for ExtensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(ImageExtension::as_str).collect();
        f.write_str(&names.join(","))
    }
}
