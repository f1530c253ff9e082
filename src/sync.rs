//! Side-car synchronization.
//!
//! Every image `P` under the asset root owns a side-car `P.hash` holding its
//! blur hash. The [`Synchronizer`] is the only writer of side-cars: given a
//! changed path it decides whether to generate, leave alone, repair, or
//! delete, and applies that decision immediately.
//!
//! ## Decision table
//!
//! Evaluated in order for [`Synchronizer::reconcile`]:
//!
//! 1. **Side-car path** whose image is in scope but the side-car itself is
//!    missing or invalid → *repair*: regenerate the image's hash.
//!    Otherwise continue with the side-car path as the subject.
//! 2. **In-scope image** → generate, unless a valid side-car exists and
//!    `skip_if_sidecar_exists` is set (full scans never redo work; explicit
//!    change events always regenerate).
//! 3. **Anything else** → the image is gone (or never qualified): delete its
//!    side-car if one exists.
//!
//! Generation re-checks the image right before encoding, since a path can
//! change classification between being queued and being processed. An
//! encoder failure abandons that one path; no side-car is written.
//!
//! ## Failure policy
//!
//! Per-path failures never abort a batch. Failed deletions are reported and
//! the file is left for a later pass.

use crate::classify::{PathClassifier, has_sidecar_extension, image_path_for, sidecar_path_for};
use crate::config::Settings;
use crate::encoder::{ComponentRatio, EncoderError, EncoderStatus, HashEncoder};
use crate::scan::find_sidecars;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Encoding(#[from] EncoderError),
    #[error("Image not found: {0}")]
    ImageNotFound(PathBuf),
    #[error("{path} is not inside {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },
    #[error("Could not write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a single reconciliation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// A side-car was written for an image.
    Generated { image: PathBuf, sidecar: PathBuf },
    /// A missing side-car was rewritten after its removal was reported.
    Repaired { image: PathBuf, sidecar: PathBuf },
    /// The image already had a side-car and the caller asked to keep it.
    Skipped { image: PathBuf },
    /// A stale side-car was deleted.
    Removed { sidecar: PathBuf },
    /// Nothing to do, or a deletion failed and the file was left in place.
    Unchanged { path: PathBuf },
}

/// Progress notifications, streamed to the CLI printer.
///
/// Paths are index keys (`/sub/a.jpg`) when they fall under the asset root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    EncoderReady(EncoderStatus),
    EncoderUnavailable { error: String },
    Generated { key: String },
    Repaired { key: String },
    Removed { key: String },
    OrphanRemoved { key: String },
    RemoveFailed { key: String, error: String },
    Failed { key: String, error: String },
    IndexWritten { path: PathBuf, entries: usize },
    IndexFailed { error: String },
}

/// Counts for one pass over a batch of paths.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub generated: u32,
    pub repaired: u32,
    pub skipped: u32,
    pub removed: u32,
    pub unchanged: u32,
    pub failed: u32,
}

impl SyncStats {
    pub fn record(&mut self, action: &SyncAction) {
        match action {
            SyncAction::Generated { .. } => self.generated += 1,
            SyncAction::Repaired { .. } => self.repaired += 1,
            SyncAction::Skipped { .. } => self.skipped += 1,
            SyncAction::Removed { .. } => self.removed += 1,
            SyncAction::Unchanged { .. } => self.unchanged += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.generated + self.repaired + self.skipped + self.removed + self.unchanged + self.failed
    }
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [
            (self.generated, "generated"),
            (self.repaired, "repaired"),
            (self.skipped, "up to date"),
            (self.removed, "removed"),
            (self.failed, "failed"),
        ]
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{n} {label}"))
        .collect();

        if parts.is_empty() {
            write!(f, "nothing to do ({} paths)", self.total())
        } else {
            write!(f, "{} ({} paths)", parts.join(", "), self.total())
        }
    }
}

/// Reconciles side-cars with the images they describe.
pub struct Synchronizer<'a, E: HashEncoder> {
    classifier: PathClassifier,
    components: ComponentRatio,
    encoder: &'a E,
    events: Option<Sender<SyncEvent>>,
}

impl<'a, E: HashEncoder> Synchronizer<'a, E> {
    pub fn new(settings: &Settings, encoder: &'a E) -> Self {
        Self {
            classifier: PathClassifier::new(settings),
            components: settings.components,
            encoder,
            events: None,
        }
    }

    /// Report progress on `tx`. A dropped receiver is ignored.
    pub fn with_events(mut self, tx: Sender<SyncEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn classifier(&self) -> &PathClassifier {
        &self.classifier
    }

    /// Bring the side-car for `path` in line with the filesystem.
    ///
    /// `path` may be an image or a side-car, and may no longer exist. See
    /// the [module docs](self) for the decision table.
    pub fn reconcile(
        &self,
        path: &Path,
        skip_if_sidecar_exists: bool,
    ) -> Result<SyncAction, SyncError> {
        let Some(path) = self.classifier.resolve(path) else {
            return Ok(SyncAction::Unchanged {
                path: path.to_path_buf(),
            });
        };

        if has_sidecar_extension(&path) {
            let image = image_path_for(&path);
            if self.classifier.is_in_scope_image(&image) && !self.classifier.is_valid_sidecar(&path)
            {
                warn!(image = %image.display(), "side-car gone while image still exists, regenerating");
                return self.generate(&image, true);
            }
        }

        if self.classifier.is_in_scope_image(&path) {
            let sidecar = sidecar_path_for(&path);
            if skip_if_sidecar_exists && self.classifier.is_valid_sidecar(&sidecar) {
                debug!(image = %path.display(), "side-car present, skipping");
                return Ok(SyncAction::Skipped { image: path });
            }
            return self.generate(&path, false);
        }

        Ok(self.remove_sidecar_of(&path))
    }

    /// Reconcile `paths` one after another. Failures are logged, reported
    /// as [`SyncEvent::Failed`], counted, and never stop the batch.
    pub fn reconcile_batch<I>(&self, paths: I, skip_if_sidecar_exists: bool) -> SyncStats
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        let mut stats = SyncStats::default();
        for path in paths {
            let path = path.as_ref();
            match self.reconcile(path, skip_if_sidecar_exists) {
                Ok(action) => stats.record(&action),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "reconciliation failed");
                    self.emit(SyncEvent::Failed {
                        key: self.key(path),
                        error: e.to_string(),
                    });
                    stats.failed += 1;
                }
            }
        }
        stats
    }

    /// Delete every side-car under the root whose image is no longer an
    /// in-scope image. Returns the side-cars actually deleted.
    pub fn prune_orphans(&self) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        for sidecar in find_sidecars(&self.classifier) {
            if self.classifier.is_in_scope_image(&image_path_for(&sidecar)) {
                continue;
            }
            match fs::remove_file(&sidecar) {
                Ok(()) => {
                    info!(sidecar = %sidecar.display(), "removed orphaned side-car");
                    self.emit(SyncEvent::OrphanRemoved {
                        key: self.key(&sidecar),
                    });
                    removed.push(sidecar);
                }
                Err(e) => self.report_remove_failure(&sidecar, &e),
            }
        }
        removed
    }

    /// Report progress. Used by the pipeline for events outside a single
    /// reconciliation (encoder setup, index writes).
    pub fn emit(&self, event: SyncEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn generate(&self, image: &Path, repair: bool) -> Result<SyncAction, SyncError> {
        if !self.classifier.is_in_scope_image(image) {
            return Ok(self.remove_sidecar_of(image));
        }
        if !image.exists() {
            return Err(SyncError::ImageNotFound(image.to_path_buf()));
        }
        if !self.classifier.is_under_root(image) {
            return Err(SyncError::OutsideRoot {
                path: image.to_path_buf(),
                root: self.classifier.root().to_path_buf(),
            });
        }

        let hash = self.encoder.encode(image, self.components)?;
        let sidecar = sidecar_path_for(image);
        fs::write(&sidecar, &hash).map_err(|source| SyncError::Write {
            path: sidecar.clone(),
            source,
        })?;

        info!(sidecar = %sidecar.display(), %hash, "side-car written");
        let key = self.key(image);
        let image = image.to_path_buf();
        if repair {
            self.emit(SyncEvent::Repaired { key });
            Ok(SyncAction::Repaired { image, sidecar })
        } else {
            self.emit(SyncEvent::Generated { key });
            Ok(SyncAction::Generated { image, sidecar })
        }
    }

    /// The image at `path` is gone or out of scope: drop its side-car.
    fn remove_sidecar_of(&self, path: &Path) -> SyncAction {
        let sidecar = sidecar_path_for(path);
        if !self.classifier.is_valid_sidecar(&sidecar) {
            return SyncAction::Unchanged {
                path: path.to_path_buf(),
            };
        }
        match fs::remove_file(&sidecar) {
            Ok(()) => {
                info!(sidecar = %sidecar.display(), "removed stale side-car");
                self.emit(SyncEvent::Removed {
                    key: self.key(&sidecar),
                });
                SyncAction::Removed { sidecar }
            }
            Err(e) => {
                self.report_remove_failure(&sidecar, &e);
                SyncAction::Unchanged { path: sidecar }
            }
        }
    }

    fn report_remove_failure(&self, sidecar: &Path, error: &std::io::Error) {
        warn!(sidecar = %sidecar.display(), %error, "could not delete side-car");
        self.emit(SyncEvent::RemoveFailed {
            key: self.key(sidecar),
            error: error.to_string(),
        });
    }

    fn key(&self, path: &Path) -> String {
        self.classifier
            .relative_key(path)
            .unwrap_or_else(|| path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::backend::tests::MockEncoder;
    use crate::test_helpers::Fixture;
    use std::sync::mpsc;

    // =========================================================================
    // Images
    // =========================================================================

    #[test]
    fn new_image_gets_sidecar_in_either_mode() {
        for skip in [true, false] {
            let f = Fixture::with_files(&["a.jpg"]);
            let encoder = MockEncoder::new();
            let sync = Synchronizer::new(&f.settings, &encoder);

            let action = sync.reconcile(&f.path("a.jpg"), skip).unwrap();

            assert_eq!(
                action,
                SyncAction::Generated {
                    image: f.path("a.jpg"),
                    sidecar: f.path("a.jpg.hash")
                }
            );
            assert_eq!(f.read("a.jpg.hash").as_deref(), Some("L~a.jpg"));
        }
    }

    #[test]
    fn existing_sidecar_is_kept_on_full_scan() {
        let f = Fixture::with_files(&["a.jpg"]);
        f.add("a.jpg.hash", "previous");
        let encoder = MockEncoder::new();
        let sync = Synchronizer::new(&f.settings, &encoder);

        let action = sync.reconcile(&f.path("a.jpg"), true).unwrap();

        assert_eq!(action, SyncAction::Skipped { image: f.path("a.jpg") });
        assert!(encoder.encoded().is_empty());
        assert_eq!(f.read("a.jpg.hash").as_deref(), Some("previous"));
    }

    #[test]
    fn existing_sidecar_is_overwritten_on_change_event() {
        let f = Fixture::with_files(&["a.jpg"]);
        f.add("a.jpg.hash", "previous");
        let encoder = MockEncoder::new();
        let sync = Synchronizer::new(&f.settings, &encoder);

        sync.reconcile(&f.path("a.jpg"), false).unwrap();

        assert_eq!(f.read("a.jpg.hash").as_deref(), Some("L~a.jpg"));
    }

    #[test]
    fn encoder_receives_absolute_path_and_components() {
        let f = Fixture::with_files(&["sub/a.png"]);
        let encoder = MockEncoder::new();
        let sync = Synchronizer::new(&f.settings, &encoder);

        sync.reconcile(&f.path("sub/./a.png"), false).unwrap();

        let calls = encoder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, f.path("sub/a.png"));
        assert_eq!(calls[0].1, ComponentRatio::default());
    }

    // =========================================================================
    // Removal
    // =========================================================================

    #[test]
    fn deleted_image_loses_its_sidecar() {
        let f = Fixture::with_files(&["a.jpg", "b.jpg"]);
        f.add("a.jpg.hash", "La");
        f.add("b.jpg.hash", "Lb");
        std::fs::remove_file(f.path("a.jpg")).unwrap();
        let encoder = MockEncoder::new();
        let sync = Synchronizer::new(&f.settings, &encoder);

        let action = sync.reconcile(&f.path("a.jpg"), false).unwrap();

        assert_eq!(
            action,
            SyncAction::Removed {
                sidecar: f.path("a.jpg.hash")
            }
        );
        assert_eq!(f.sidecars(), vec!["b.jpg.hash"]);
    }

    #[test]
    fn out_of_scope_file_loses_its_sidecar() {
        let f = Fixture::new(&["jpg"]);
        f.add("c.png", "not tracked");
        f.add("c.png.hash", "Lc");
        let encoder = MockEncoder::new();
        let sync = Synchronizer::new(&f.settings, &encoder);

        let action = sync.reconcile(&f.path("c.png"), false).unwrap();

        assert!(matches!(action, SyncAction::Removed { .. }));
        assert!(f.read("c.png").is_some());
        assert!(f.read("c.png.hash").is_none());
    }

    #[test]
    fn unrelated_path_is_unchanged() {
        let f = Fixture::with_files(&["a.jpg"]);
        let encoder = MockEncoder::new();
        let sync = Synchronizer::new(&f.settings, &encoder);

        let action = sync.reconcile(&f.path("gone.jpg"), false).unwrap();

        assert_eq!(action, SyncAction::Unchanged { path: f.path("gone.jpg") });
    }

    #[test]
    fn paths_outside_root_are_never_touched() {
        let f = Fixture::with_files(&[]);
        let outside = f.root().parent().unwrap().join("x.jpg");
        crate::test_helpers::write_file(&outside, "img");
        let outside_hash = crate::classify::sidecar_path_for(&outside);
        crate::test_helpers::write_file(&outside_hash, "Lx");
        let encoder = MockEncoder::new();
        let sync = Synchronizer::new(&f.settings, &encoder);

        sync.reconcile(&outside, false).unwrap();
        std::fs::remove_file(&outside).unwrap();
        sync.reconcile(&outside, false).unwrap();

        assert!(encoder.encoded().is_empty());
        assert!(outside_hash.exists());
    }

    // =========================================================================
    // Side-car events
    // =========================================================================

    #[test]
    fn deleted_sidecar_is_repaired() {
        let f = Fixture::with_files(&["a.jpg"]);
        let encoder = MockEncoder::new();
        let sync = Synchronizer::new(&f.settings, &encoder);

        let action = sync.reconcile(&f.path("a.jpg.hash"), false).unwrap();

        assert_eq!(
            action,
            SyncAction::Repaired {
                image: f.path("a.jpg"),
                sidecar: f.path("a.jpg.hash")
            }
        );
        assert_eq!(f.read("a.jpg.hash").as_deref(), Some("L~a.jpg"));
    }

    #[test]
    fn repair_ignores_skip_flag() {
        let f = Fixture::with_files(&["a.jpg"]);
        let encoder = MockEncoder::new();
        let sync = Synchronizer::new(&f.settings, &encoder);

        let action = sync.reconcile(&f.path("a.jpg.hash"), true).unwrap();

        assert!(matches!(action, SyncAction::Repaired { .. }));
    }

    #[test]
    fn sidecar_of_deleted_image_event_is_a_no_op() {
        let f = Fixture::with_files(&[]);
        let encoder = MockEncoder::new();
        let sync = Synchronizer::new(&f.settings, &encoder);

        let action = sync.reconcile(&f.path("a.jpg.hash"), false).unwrap();

        assert!(matches!(action, SyncAction::Unchanged { .. }));
        assert!(encoder.encoded().is_empty());
    }

    #[test]
    fn freshly_written_sidecar_event_is_a_no_op() {
        let f = Fixture::with_files(&["a.jpg"]);
        f.add("a.jpg.hash", "La");
        let encoder = MockEncoder::new();
        let sync = Synchronizer::new(&f.settings, &encoder);

        let action = sync.reconcile(&f.path("a.jpg.hash"), false).unwrap();

        assert!(matches!(action, SyncAction::Unchanged { .. }));
        assert!(encoder.encoded().is_empty());
        assert_eq!(f.read("a.jpg.hash").as_deref(), Some("La"));
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[test]
    fn encoder_failure_writes_nothing() {
        let f = Fixture::with_files(&["a.jpg"]);
        let encoder = MockEncoder::failing_for(vec![f.path("a.jpg")]);
        let sync = Synchronizer::new(&f.settings, &encoder);

        let err = sync.reconcile(&f.path("a.jpg"), false).unwrap_err();

        assert!(matches!(err, SyncError::Encoding(EncoderError::EncodingFailed { .. })));
        assert!(f.sidecars().is_empty());
    }

    #[test]
    fn batch_continues_after_failure() {
        let f = Fixture::with_files(&["a.jpg", "b.jpg", "c.jpg"]);
        let encoder = MockEncoder::failing_for(vec![f.path("b.jpg")]);
        let (tx, rx) = mpsc::channel();
        let sync = Synchronizer::new(&f.settings, &encoder).with_events(tx);

        let stats = sync.reconcile_batch(
            [f.path("a.jpg"), f.path("b.jpg"), f.path("c.jpg")],
            false,
        );

        assert_eq!(stats.generated, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(f.sidecars(), vec!["a.jpg.hash", "c.jpg.hash"]);
        assert_eq!(
            encoder.encoded(),
            vec![f.path("a.jpg"), f.path("b.jpg"), f.path("c.jpg")]
        );
        drop(sync);
        let events: Vec<SyncEvent> = rx.iter().collect();
        assert!(events.iter().any(|e| matches!(e, SyncEvent::Failed { key, .. } if key == "/b.jpg")));
    }

    #[cfg(unix)]
    #[test]
    fn failed_deletion_is_reported_not_raised() {
        use std::os::unix::fs::PermissionsExt;

        let f = Fixture::with_files(&[]);
        let dir = f.path("locked");
        f.add("locked/a.jpg.hash", "La");
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o555)).unwrap();
        // Root ignores directory permissions; nothing to assert there.
        let writable = std::fs::File::create(dir.join("probe")).is_ok();

        let encoder = MockEncoder::new();
        let (tx, rx) = mpsc::channel();
        let sync = Synchronizer::new(&f.settings, &encoder).with_events(tx);
        let result = sync.reconcile(&f.path("locked/a.jpg"), false);
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();

        if writable {
            return;
        }
        assert!(matches!(result, Ok(SyncAction::Unchanged { .. })));
        assert!(f.path("locked/a.jpg.hash").exists());
        drop(sync);
        assert!(rx.iter().any(|e| matches!(e, SyncEvent::RemoveFailed { .. })));
    }

    // =========================================================================
    // Orphans
    // =========================================================================

    #[test]
    fn prune_removes_only_orphans() {
        let f = Fixture::new(&["jpg"]);
        f.add("a.jpg", "img");
        f.add("a.jpg.hash", "La");
        f.add("gone.jpg.hash", "Lg");
        f.add("sub/c.png", "img");
        f.add("sub/c.png.hash", "Lc");
        let encoder = MockEncoder::new();
        let sync = Synchronizer::new(&f.settings, &encoder);

        let mut removed = sync.prune_orphans();
        removed.sort();

        assert_eq!(removed, vec![f.path("gone.jpg.hash"), f.path("sub/c.png.hash")]);
        assert_eq!(f.sidecars(), vec!["a.jpg.hash"]);
    }

    // =========================================================================
    // Stats
    // =========================================================================

    #[test]
    fn stats_display() {
        let stats = SyncStats {
            generated: 2,
            skipped: 3,
            failed: 1,
            ..SyncStats::default()
        };
        assert_eq!(stats.to_string(), "2 generated, 3 up to date, 1 failed (6 paths)");
    }

    #[test]
    fn stats_display_when_idle() {
        let stats = SyncStats {
            unchanged: 2,
            ..SyncStats::default()
        };
        assert_eq!(stats.to_string(), "nothing to do (2 paths)");
    }
}
