//! Hash encoder trait and shared types.
//!
//! The [`HashEncoder`] trait is the seam between the synchronizer and
//! whatever turns image bytes into a blur hash. The production
//! implementation is [`ProcessEncoder`](super::process_backend::ProcessEncoder),
//! which shells out to an external encoder binary. Tests use the recording
//! `MockEncoder` below so no binary is required.

use super::params::ComponentRatio;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not run encoder {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Encoding failed for {path}: {reason}")]
    EncodingFailed { path: PathBuf, reason: String },
    #[error("Encoder build failed: {0}")]
    BuildFailed(String),
}

/// How [`HashEncoder::ensure`] made the encoder available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderStatus {
    /// Already in place, nothing done.
    Ready,
    /// A previous build output was moved into place.
    Installed,
    /// The build command ran and its output was moved into place.
    Built,
}

/// Trait for blur hash encoders.
pub trait HashEncoder {
    /// One-time setup before the first [`encode`](Self::encode) call.
    ///
    /// Idempotent. Encoders that need no setup keep the default.
    fn ensure(&self) -> Result<EncoderStatus, EncoderError> {
        Ok(EncoderStatus::Ready)
    }

    /// Compute the blur hash of the image at `image`.
    fn encode(&self, image: &Path, ratio: ComponentRatio) -> Result<String, EncoderError>;
}
