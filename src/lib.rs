//! # blurhash-map
//!
//! Keeps a directory of images paired with blur hashes. Every image `P`
//! under the asset root gets a side-car file `P.hash` holding its hash, and
//! the side-cars are aggregated into one JSON index that a front end can
//! load to paint placeholders before the real images arrive:
//!
//! ```text
//! assets/
//! ├── hero.jpg
//! ├── hero.jpg.hash          # LKO2?U%2Tw=w]~RBVZRi...
//! └── gallery/
//!     ├── 01.png
//!     └── 01.png.hash
//!
//! hashmap.json               # [["/hero.jpg","LKO2..."],["/gallery/01.png","L9Sg..."]]
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! 1. Initialize   scan root → hash images lacking side-cars → write index
//! 2. Watch        debounced change batches → reconcile each path → rewrite index
//! ```
//!
//! Hashes come from an external encoder executable, built from source on
//! first use when it isn't installed yet.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `blurhash-map.toml` loading, CLI overrides, validation into [`config::Settings`] |
//! | [`extensions`] | The fixed image extension universe and validated subsets |
//! | [`classify`] | Path predicates: in-scope image, valid side-car, index keys |
//! | [`encoder`] | The [`encoder::HashEncoder`] seam and the external process encoder |
//! | [`scan`] | Recursive discovery of images and side-cars |
//! | [`sync`] | Per-path reconciliation of side-cars with their images, orphan pruning |
//! | [`index`] | The atomic JSON index rebuild |
//! | [`pipeline`] | Initialize, change batches, rebuild, and read-only checks |
//! | [`watch`] | notify-based watcher producing debounced batches |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Side-cars as the Source of Truth
//!
//! The index is always derived from side-cars on disk, never patched in
//! place. A hash survives restarts and is never recomputed for an image that
//! already has one, and a rebuild is simply "read every side-car again".
//!
//! ## All-or-Nothing Index
//!
//! A rebuild fails if any image lacks a side-car and leaves the previous
//! index untouched. The index therefore never lists an image without a hash
//! and never omits one silently. Writes go through a temporary sibling and a
//! rename.
//!
//! ## Single-Threaded Reconciliation
//!
//! Paths are processed one at a time. The encoder is the bottleneck, and a
//! single writer means no two reconciliations ever race on the same
//! side-car.

pub mod classify;
pub mod config;
pub mod encoder;
pub mod extensions;
pub mod index;
pub mod output;
pub mod pipeline;
pub mod scan;
pub mod sync;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
