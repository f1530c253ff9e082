//! Orchestration: full scan on startup, change batches afterwards.
//!
//! ```text
//! initialize   ensure encoder → reconcile every image (skip existing) → rebuild
//! change batch reconcile each path (always regenerate)        → caller rebuilds
//! ```
//!
//! The pipeline never schedules rebuilds on its own; the watch loop (or any
//! other caller) decides when to call [`Pipeline::rebuild`].

use crate::classify::{image_path_for, sidecar_path_for};
use crate::config::Settings;
use crate::encoder::{EncoderStatus, HashEncoder};
use crate::index::{self, IndexError};
use crate::scan::{find_images, find_sidecars};
use crate::sync::{SyncEvent, SyncStats, Synchronizer};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use tracing::{error, info};

/// Result of [`Pipeline::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    /// `None` when the encoder could not be made available.
    pub encoder: Option<EncoderStatus>,
    pub stats: SyncStats,
    /// Where the index was written.
    pub target: PathBuf,
}

/// Read-only audit of the asset tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub images: usize,
    /// Index keys of images without a valid side-car.
    pub missing: Vec<String>,
    /// Index keys of side-cars whose image is not an in-scope image.
    pub orphans: Vec<String>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.orphans.is_empty()
    }
}

/// Wires the synchronizer and index builder to one immutable [`Settings`].
pub struct Pipeline<E: HashEncoder> {
    settings: Settings,
    encoder: E,
    events: Option<Sender<SyncEvent>>,
}

impl<E: HashEncoder> Pipeline<E> {
    pub fn new(settings: Settings, encoder: E) -> Self {
        Self {
            settings,
            encoder,
            events: None,
        }
    }

    /// Stream progress events to `tx`.
    pub fn with_events(mut self, tx: Sender<SyncEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[cfg(test)]
    pub(crate) fn encoder(&self) -> &E {
        &self.encoder
    }

    fn synchronizer(&self) -> Synchronizer<'_, E> {
        let sync = Synchronizer::new(&self.settings, &self.encoder);
        match &self.events {
            Some(tx) => sync.with_events(tx.clone()),
            None => sync,
        }
    }

    /// Make the encoder available. A failure is logged and reported but not
    /// returned: every later encode will fail and be reported per file.
    pub fn ensure_encoder(&self) -> Option<EncoderStatus> {
        let sync = self.synchronizer();
        match self.encoder.ensure() {
            Ok(status) => {
                info!(?status, "encoder available");
                sync.emit(SyncEvent::EncoderReady(status));
                Some(status)
            }
            Err(e) => {
                error!(error = %e, "encoder unavailable");
                sync.emit(SyncEvent::EncoderUnavailable {
                    error: e.to_string(),
                });
                None
            }
        }
    }

    /// Ensure the encoder, hash every image lacking a side-car, and write
    /// the index.
    pub fn initialize(&self) -> Result<InitReport, IndexError> {
        let encoder = self.ensure_encoder();
        let sync = self.synchronizer();
        let images = find_images(sync.classifier());
        info!(images = images.len(), root = %self.settings.asset_root.display(), "initial scan");
        let stats = sync.reconcile_batch(images, true);
        let target = self.rebuild()?;
        Ok(InitReport {
            encoder,
            stats,
            target,
        })
    }

    /// Reconcile each reported path, in order, always regenerating.
    pub fn on_change_batch<I>(&self, paths: I) -> SyncStats
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        self.synchronizer().reconcile_batch(paths, false)
    }

    /// Prune orphans and rewrite the index. Returns the index path.
    pub fn rebuild(&self) -> Result<PathBuf, IndexError> {
        let sync = self.synchronizer();
        match index::rebuild(&sync, &self.settings.target) {
            Ok(index) => {
                sync.emit(SyncEvent::IndexWritten {
                    path: self.settings.target.clone(),
                    entries: index.len(),
                });
                Ok(self.settings.target.clone())
            }
            Err(e) => {
                error!(error = %e, "index not written");
                sync.emit(SyncEvent::IndexFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Report missing and orphaned side-cars without changing anything.
    pub fn check(&self) -> CheckReport {
        let sync = Synchronizer::new(&self.settings, &self.encoder);
        let classifier = sync.classifier();
        let key = |p: &Path| {
            classifier
                .relative_key(p)
                .unwrap_or_else(|| p.display().to_string())
        };

        let images = find_images(classifier);
        let missing = images
            .iter()
            .filter(|img| !classifier.is_valid_sidecar(&sidecar_path_for(img)))
            .map(|img| key(img.as_path()))
            .collect();
        let orphans = find_sidecars(classifier)
            .iter()
            .filter(|sc| !classifier.is_in_scope_image(&image_path_for(sc)))
            .map(|sc| key(sc.as_path()))
            .collect();

        CheckReport {
            images: images.len(),
            missing,
            orphans,
        }
    }
}
