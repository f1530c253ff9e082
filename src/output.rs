//! CLI output formatting.
//!
//! Output is path-centric: every line leads with a fixed-width verb column
//! followed by the index key of the file it concerns, so a run reads as a
//! change log of the asset tree.
//!
//! # Output Format
//!
//! ## Settings header
//!
//! ```text
//! Assets      /srv/site/src/assets
//! Extensions  jpg,jpeg,png,bmp,webp
//! Components  4x3
//! Target      /srv/site/hashmap.json
//! ```
//!
//! ## Sync events
//!
//! ```text
//! Encoder     ready
//! Created     /images/a.jpg
//! Repaired    /images/b.png
//! Removed     /images/old.jpg.hash
//! Removed     /gone.webp.hash (orphan)
//! Failed      /broken.jpg
//!     encoder exited with status 1
//! Index       /srv/site/hashmap.json (2 entries)
//! ```
//!
//! ## Check
//!
//! ```text
//! Missing     /images/new.jpg
//! Orphan      /images/old.jpg.hash
//! 12 images, 1 missing, 1 orphaned
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::config::Settings;
use crate::encoder::EncoderStatus;
use crate::pipeline::{CheckReport, InitReport};
use crate::sync::{SyncEvent, SyncStats};

const VERB_WIDTH: usize = 12;

fn line(verb: &str, subject: impl std::fmt::Display) -> String {
    format!("{verb:<width$}{subject}", width = VERB_WIDTH)
}

fn detail(text: &str) -> String {
    format!("    {text}")
}

// ============================================================================
// Settings
// ============================================================================

pub fn format_settings(settings: &Settings) -> Vec<String> {
    vec![
        line("Assets", settings.asset_root.display()),
        line("Extensions", &settings.extensions),
        line("Components", settings.components),
        line("Target", settings.target.display()),
    ]
}

pub fn print_settings(settings: &Settings) {
    for l in format_settings(settings) {
        println!("{l}");
    }
}

// ============================================================================
// Sync events
// ============================================================================

/// Format a single progress event as display lines.
pub fn format_sync_event(event: &SyncEvent) -> Vec<String> {
    match event {
        SyncEvent::EncoderReady(status) => {
            let state = match status {
                EncoderStatus::Ready => "ready",
                EncoderStatus::Installed => "installed",
                EncoderStatus::Built => "built",
            };
            vec![line("Encoder", state)]
        }
        SyncEvent::EncoderUnavailable { error } => {
            vec![line("Encoder", "unavailable"), detail(error)]
        }
        SyncEvent::Generated { key } => vec![line("Created", key)],
        SyncEvent::Repaired { key } => vec![line("Repaired", key)],
        SyncEvent::Removed { key } => vec![line("Removed", key)],
        SyncEvent::OrphanRemoved { key } => vec![line("Removed", format!("{key} (orphan)"))],
        SyncEvent::RemoveFailed { key, error } => vec![line("Kept", key), detail(error)],
        SyncEvent::Failed { key, error } => vec![line("Failed", key), detail(error)],
        SyncEvent::IndexWritten { path, entries } => {
            let noun = if *entries == 1 { "entry" } else { "entries" };
            vec![line(
                "Index",
                format!("{} ({entries} {noun})", path.display()),
            )]
        }
        SyncEvent::IndexFailed { error } => vec![line("Index", "not written"), detail(error)],
    }
}

// ============================================================================
// Summaries
// ============================================================================

pub fn format_init_report(report: &InitReport) -> Vec<String> {
    vec![format!("Initialized: {}", report.stats)]
}

pub fn print_init_report(report: &InitReport) {
    for l in format_init_report(report) {
        println!("{l}");
    }
}

/// One line per watch batch.
pub fn format_batch_summary(stats: &SyncStats) -> Vec<String> {
    vec![format!("Batch: {stats}")]
}

pub fn print_batch_summary(stats: &SyncStats) {
    for l in format_batch_summary(stats) {
        println!("{l}");
    }
}

pub fn format_check_report(report: &CheckReport) -> Vec<String> {
    let mut lines = Vec::new();
    for key in &report.missing {
        lines.push(line("Missing", key));
    }
    for key in &report.orphans {
        lines.push(line("Orphan", key));
    }
    let noun = if report.images == 1 { "image" } else { "images" };
    if report.is_clean() {
        lines.push(format!("{} {noun}, all side-cars present", report.images));
    } else {
        lines.push(format!(
            "{} {noun}, {} missing, {} orphaned",
            report.images,
            report.missing.len(),
            report.orphans.len()
        ));
    }
    lines
}

pub fn print_check_report(report: &CheckReport) {
    for l in format_check_report(report) {
        println!("{l}");
    }
}
