//! Filesystem watching with debounced batches.
//!
//! Raw notify events are filtered to image and side-car paths, collected into
//! an ordered, de-duplicated batch, and handed over once the asset root has
//! been quiet for the debounce window. Our own side-car writes come back as
//! events too; the synchronizer treats those as no-ops, so the loop settles.

use crate::config::Settings;
use crate::extensions::ExtensionSet;
use crate::scan::files_under;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Watch the asset root recursively and call `on_batch` for every settled
/// batch of changed paths. Blocks until the watcher shuts down.
pub fn watch<F>(settings: &Settings, on_batch: F) -> Result<(), WatchError>
where
    F: FnMut(Vec<PathBuf>),
{
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })?;
    watcher.watch(&settings.asset_root, RecursiveMode::Recursive)?;
    info!(
        root = %settings.asset_root.display(),
        extensions = %settings.extensions,
        debounce_ms = settings.debounce.as_millis() as u64,
        "watching"
    );

    run_loop(&rx, &settings.extensions, settings.debounce, on_batch);
    Ok(())
}

/// Drain `rx` into debounced batches until the sender side closes.
///
/// A pending batch is flushed when no relevant event arrived for `debounce`,
/// and once more on disconnect.
pub fn run_loop<F>(
    rx: &Receiver<notify::Result<Event>>,
    extensions: &ExtensionSet,
    debounce: Duration,
    mut on_batch: F,
) where
    F: FnMut(Vec<PathBuf>),
{
    let mut batch = Batch::default();
    let mut last_event: Option<Instant> = None;

    loop {
        let wait = last_event.map_or(debounce, |t| debounce.saturating_sub(t.elapsed()));
        match rx.recv_timeout(wait) {
            Ok(Ok(event)) => {
                if batch.extend(&event, extensions) {
                    last_event = Some(Instant::now());
                }
            }
            Ok(Err(e)) => warn!(error = %e, "watch error"),
            Err(RecvTimeoutError::Timeout) => {
                if !batch.is_empty() {
                    on_batch(batch.take());
                }
                last_event = None;
            }
            Err(RecvTimeoutError::Disconnected) => {
                if !batch.is_empty() {
                    on_batch(batch.take());
                }
                info!("watcher closed");
                break;
            }
        }
    }
}

/// Paths in first-seen order, each once.
#[derive(Default)]
struct Batch {
    paths: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl Batch {
    /// Add the relevant paths of `event`. Returns whether any were new.
    ///
    /// A directory (moved or copied in as a whole) is reported by its own
    /// path only, so its watched files are queued by walking it.
    fn extend(&mut self, event: &Event, extensions: &ExtensionSet) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return false;
        }
        let mut added = false;
        for path in &event.paths {
            if path.is_dir() {
                for file in files_under(path.clone()).filter(|p| extensions.is_watched(p)) {
                    added |= self.push(file, &event.kind);
                }
            } else if extensions.is_watched(path) {
                added |= self.push(path.clone(), &event.kind);
            }
        }
        added
    }

    fn push(&mut self, path: PathBuf, kind: &EventKind) -> bool {
        if !self.seen.insert(path.clone()) {
            return false;
        }
        debug!(path = %path.display(), ?kind, "queued");
        self.paths.push(path);
        true
    }

    fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.seen.clear();
        std::mem::take(&mut self.paths)
    }
}
