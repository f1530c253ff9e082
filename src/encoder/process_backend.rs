//! External-process encoder.
//!
//! Invokes the encoder as `<binary> <x> <y> <absoluteImagePath>` and reads
//! the hash from standard output. Calls block until the process exits; no
//! timeout is applied.
//!
//! When the binary is missing, [`ensure`](HashEncoder::ensure) builds it by
//! running the configured build command in the build directory and moving
//! the produced executable to the expected location. A leftover build
//! output from an earlier run is moved without rebuilding.

use super::backend::{EncoderError, EncoderStatus, HashEncoder};
use super::params::ComponentRatio;
use crate::config::EncoderSettings;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Encoder backed by an external executable.
#[derive(Debug, Clone)]
pub struct ProcessEncoder {
    binary: PathBuf,
    build_dir: PathBuf,
    build_command: Vec<String>,
    build_output: PathBuf,
}

impl ProcessEncoder {
    pub fn new(settings: &EncoderSettings) -> Self {
        Self {
            binary: settings.binary.clone(),
            build_dir: settings.build_dir.clone(),
            build_command: settings.build_command.clone(),
            build_output: settings.build_output.clone(),
        }
    }

    fn build(&self) -> Result<(), EncoderError> {
        let (program, args) = self
            .build_command
            .split_first()
            .ok_or_else(|| EncoderError::BuildFailed("build command is empty".to_string()))?;

        info!(
            command = %self.build_command.join(" "),
            dir = %self.build_dir.display(),
            "building encoder"
        );
        let output = Command::new(program)
            .args(args)
            .current_dir(&self.build_dir)
            .output()
            .map_err(|e| EncoderError::BuildFailed(format!("could not run {program}: {e}")))?;

        if !output.status.success() {
            return Err(EncoderError::BuildFailed(format!(
                "{program} {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if !self.build_output.exists() {
            return Err(EncoderError::BuildFailed(format!(
                "build finished but {} was not produced",
                self.build_output.display()
            )));
        }
        Ok(())
    }
}

impl HashEncoder for ProcessEncoder {
    fn ensure(&self) -> Result<EncoderStatus, EncoderError> {
        if self.binary.exists() {
            return Ok(EncoderStatus::Ready);
        }
        if self.build_output.exists() {
            install(&self.build_output, &self.binary)?;
            return Ok(EncoderStatus::Installed);
        }
        self.build()?;
        install(&self.build_output, &self.binary)?;
        Ok(EncoderStatus::Built)
    }

    fn encode(&self, image: &Path, ratio: ComponentRatio) -> Result<String, EncoderError> {
        debug!(image = %image.display(), %ratio, "encoding");
        let output = Command::new(&self.binary)
            .arg(ratio.x().to_string())
            .arg(ratio.y().to_string())
            .arg(image)
            .output()
            .map_err(|source| EncoderError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(EncoderError::EncodingFailed {
                path: image.to_path_buf(),
                reason: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if hash.is_empty() {
            return Err(EncoderError::EncodingFailed {
                path: image.to_path_buf(),
                reason: "encoder printed no hash".to_string(),
            });
        }
        Ok(hash)
    }
}

/// Move `from` to `to`, copying when a rename can't cross filesystems.
fn install(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(tmp: &Path, build_command: &[&str]) -> EncoderSettings {
        EncoderSettings {
            binary: tmp.join("bin/blurhash_encoder"),
            build_dir: tmp.join("build"),
            build_command: build_command.iter().map(|s| s.to_string()).collect(),
            build_output: tmp.join("build/blurhash_encoder"),
        }
    }

    fn encoder_with_binary(binary: &str) -> ProcessEncoder {
        ProcessEncoder {
            binary: PathBuf::from(binary),
            build_dir: PathBuf::from("."),
            build_command: vec!["true".to_string()],
            build_output: PathBuf::from("unused"),
        }
    }

    #[test]
    fn ensure_ready_when_binary_present() {
        let tmp = TempDir::new().unwrap();
        let s = settings(tmp.path(), &["false"]);
        fs::create_dir_all(s.binary.parent().unwrap()).unwrap();
        fs::write(&s.binary, "bin").unwrap();

        let encoder = ProcessEncoder::new(&s);
        assert_eq!(encoder.ensure().unwrap(), EncoderStatus::Ready);
    }

    #[test]
    fn ensure_moves_existing_build_output() {
        let tmp = TempDir::new().unwrap();
        let s = settings(tmp.path(), &["false"]);
        fs::create_dir_all(&s.build_dir).unwrap();
        fs::write(&s.build_output, "bin").unwrap();

        let encoder = ProcessEncoder::new(&s);
        assert_eq!(encoder.ensure().unwrap(), EncoderStatus::Installed);
        assert!(s.binary.exists());
        assert!(!s.build_output.exists());
    }

    #[cfg(unix)]
    #[test]
    fn ensure_builds_then_installs() {
        let tmp = TempDir::new().unwrap();
        let s = settings(tmp.path(), &["sh", "-c", "echo built > blurhash_encoder"]);
        fs::create_dir_all(&s.build_dir).unwrap();

        let encoder = ProcessEncoder::new(&s);
        assert_eq!(encoder.ensure().unwrap(), EncoderStatus::Built);
        assert_eq!(fs::read_to_string(&s.binary).unwrap().trim(), "built");
        // Second call finds the binary in place.
        assert_eq!(encoder.ensure().unwrap(), EncoderStatus::Ready);
    }

    #[cfg(unix)]
    #[test]
    fn ensure_reports_failing_build() {
        let tmp = TempDir::new().unwrap();
        let s = settings(tmp.path(), &["sh", "-c", "echo 'no rule' >&2; exit 2"]);
        fs::create_dir_all(&s.build_dir).unwrap();

        let err = ProcessEncoder::new(&s).ensure().unwrap_err();
        let EncoderError::BuildFailed(message) = err else {
            panic!("expected BuildFailed, got {err:?}");
        };
        assert!(message.contains("no rule"));
        assert!(!s.binary.exists());
    }

    #[cfg(unix)]
    #[test]
    fn ensure_reports_build_without_output() {
        let tmp = TempDir::new().unwrap();
        let s = settings(tmp.path(), &["true"]);
        fs::create_dir_all(&s.build_dir).unwrap();

        let err = ProcessEncoder::new(&s).ensure().unwrap_err();
        assert!(err.to_string().contains("was not produced"));
    }

    #[test]
    fn ensure_reports_missing_build_dir() {
        let tmp = TempDir::new().unwrap();
        let s = settings(tmp.path(), &["make", "blurhash_encoder"]);

        let err = ProcessEncoder::new(&s).ensure().unwrap_err();
        assert!(matches!(err, EncoderError::BuildFailed(_)));
    }

    #[cfg(unix)]
    #[test]
    fn encode_passes_components_then_path() {
        let encoder = encoder_with_binary("echo");
        let ratio = ComponentRatio::new(5, 2).unwrap();
        let hash = encoder.encode(Path::new("/assets/a b.jpg"), ratio).unwrap();
        assert_eq!(hash, "5 2 /assets/a b.jpg");
    }

    #[cfg(unix)]
    #[test]
    fn encode_fails_on_nonzero_exit() {
        let encoder = encoder_with_binary("false");
        let err = encoder
            .encode(Path::new("/assets/a.jpg"), ComponentRatio::default())
            .unwrap_err();
        assert!(
            matches!(err, EncoderError::EncodingFailed { ref path, .. } if path == Path::new("/assets/a.jpg"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn encode_fails_on_empty_output() {
        let encoder = encoder_with_binary("true");
        let err = encoder
            .encode(Path::new("/assets/a.jpg"), ComponentRatio::default())
            .unwrap_err();
        assert!(err.to_string().contains("printed no hash"));
    }

    #[test]
    fn encode_reports_missing_binary() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        let encoder = encoder_with_binary(missing.to_str().unwrap());
        let err = encoder
            .encode(Path::new("/assets/a.jpg"), ComponentRatio::default())
            .unwrap_err();
        assert!(matches!(err, EncoderError::Spawn { .. }));
    }
}
