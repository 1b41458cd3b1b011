//! Per-job cleanup set.
//!
//! Every artifact a job writes is tracked here. `purge` deletes them all
//! once; if the set is dropped without being purged (a panic unwinding
//! through the controller), `Drop` does the deletion synchronously.

use std::path::{Path, PathBuf};

use strum::Display;

use crate::core::utils::remove_if_exists;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactRole {
    Original,
    Part,
    Thumbnail,
    Screenshot,
    Sample,
}

/// A file written by a job. Metadata is filled in where the job knows it.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFile {
    pub path: PathBuf,
    pub role: ArtifactRole,
    pub size: Option<u64>,
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>, role: ArtifactRole) -> Self {
        Self {
            path: path.into(),
            role,
            size: None,
            duration: None,
            width: None,
            height: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct CleanupSet {
    files: Vec<MediaFile>,
    purged: bool,
}

impl CleanupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `path`. A path already tracked is not added twice.
    pub fn track(&mut self, path: impl Into<PathBuf>, role: ArtifactRole) {
        self.track_file(MediaFile::new(path, role));
    }

    pub fn track_file(&mut self, file: MediaFile) {
        if self.purged {
            log::warn!("tracking {} after cleanup already ran", file.path.display());
        }
        if !self.contains(&file.path) {
            self.files.push(file);
        }
    }

    pub fn track_all<I, P>(&mut self, paths: I, role: ArtifactRole)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for path in paths {
            self.track(path, role);
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.iter().any(|f| f.path == path)
    }

    pub fn files(&self) -> &[MediaFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn is_purged(&self) -> bool {
        self.purged
    }

    /// Deletes every tracked file that still exists. Runs at most once;
    /// returns how many files were removed.
    pub async fn purge(&mut self) -> usize {
        if self.purged {
            return 0;
        }
        self.purged = true;

        let mut removed = 0;
        for file in &self.files {
            match remove_if_exists(&file.path).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => log::warn!("[CLEANUP] could not remove {}: {}", file.role, e),
            }
        }
        log::info!("[CLEANUP] removed {}/{} tracked files", removed, self.files.len());
        removed
    }
}

impl Drop for CleanupSet {
    fn drop(&mut self) {
        if self.purged {
            return;
        }
        for file in &self.files {
            if let Err(e) = fs_err::remove_file(&file.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("[CLEANUP] {}", e);
                }
            }
        }
    }
}
