//! Staged artifact downloads.
//!
//! Bytes are streamed into a temp file next to the destination and only
//! renamed into place once the transfer finished. Dropping an unfinished
//! [`AtomicDownload`] removes the temp file, so a failed transfer never
//! leaves a partial artifact behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::error::PlatformClientError;
use crate::Result;

/// Receipt for an artifact that was fully written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedDownload {
    pub artifact_id: Uuid,
    pub path: PathBuf,
    pub bytes: u64,
    /// SHA-256 hex of the bytes written
    pub sha256: String,
}

/// Artifact entry as listed by the platform for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub id: Uuid,
    pub filename: String,
}

impl ArtifactInfo {
    pub fn new(id: Uuid, filename: &str) -> Self {
        ArtifactInfo {
            id,
            filename: filename.to_string(),
        }
    }

    /// Filename usable as a single path component inside a destination folder.
    pub fn checked_filename(&self) -> Result<&str> {
        let name = self.filename.as_str();
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0');
        if invalid {
            return Err(PlatformClientError::InvalidFilename(self.filename.clone()));
        }
        Ok(name)
    }
}

/// In-flight download that becomes visible at its destination on [`commit`](Self::commit).
pub struct AtomicDownload {
    tmp: NamedTempFile,
    destination: PathBuf,
    hasher: Sha256,
    bytes: u64,
}

impl AtomicDownload {
    /// Open a temp file in the destination's directory (created if missing).
    pub fn create(destination: &Path) -> Result<Self> {
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let tmp = tempfile::Builder::new()
            .prefix(".kit-download-")
            .tempfile_in(dir)?;

        Ok(AtomicDownload {
            tmp,
            destination: destination.to_path_buf(),
            hasher: Sha256::new(),
            bytes: 0,
        })
    }

    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.tmp.write_all(chunk)?;
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
        Ok(())
    }

    /// Bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Sync and rename the temp file over the destination.
    pub fn commit(mut self, artifact_id: Uuid) -> Result<StagedDownload> {
        self.tmp.flush()?;
        self.tmp.as_file().sync_all()?;
        self.tmp.persist(&self.destination).map_err(|e| e.error)?;

        Ok(StagedDownload {
            artifact_id,
            path: self.destination,
            bytes: self.bytes,
            sha256: hex::encode(self.hasher.finalize()),
        })
    }
}

/// Write an in-memory artifact with the same all-or-nothing guarantee.
pub fn write_atomically(artifact_id: Uuid, destination: &Path, data: &[u8]) -> Result<StagedDownload> {
    let mut download = AtomicDownload::create(destination)?;
    download.write_chunk(data)?;
    download.commit(artifact_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leftover_temp_files(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".kit-download-"))
            .count()
    }

    #[test]
    fn commit_places_file_and_digest() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("model.zip");
        let id = Uuid::new_v4();

        let staged = write_atomically(id, &dest, b"hello world").unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"hello world");
        assert_eq!(staged.artifact_id, id);
        assert_eq!(staged.bytes, 11);
        assert_eq!(
            staged.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(leftover_temp_files(dir.path()), 0);
    }

    #[test]
    fn dropped_download_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("model.zip");

        {
            let mut download = AtomicDownload::create(&dest).unwrap();
            download.write_chunk(b"partial").unwrap();
            assert_eq!(download.bytes_written(), 7);
        }

        assert!(!dest.exists());
        assert_eq!(leftover_temp_files(dir.path()), 0);
    }

    #[test]
    fn commit_replaces_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("norm_stats.json");
        std::fs::write(&dest, b"old").unwrap();

        write_atomically(Uuid::new_v4(), &dest, b"new").unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn create_makes_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("stage_inputs").join("model.zip");

        write_atomically(Uuid::new_v4(), &dest, b"zip").unwrap();

        assert!(dest.is_file());
    }

    #[test]
    fn checked_filename_rejects_traversal() {
        let id = Uuid::new_v4();
        assert!(ArtifactInfo::new(id, "model.zip").checked_filename().is_ok());
        for bad in ["", ".", "..", "../etc/passwd", "a/b", "a\\b"] {
            assert!(
                ArtifactInfo::new(id, bad).checked_filename().is_err(),
                "{bad:?} should be rejected"
            );
        }
    }
}
