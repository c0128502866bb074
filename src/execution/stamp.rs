//! Commit stamping - replaces a marker with the deployed commit hash

use crate::core::DeployError;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Replaces `marker` with a commit hash in every text file under a directory
#[derive(Debug, Clone)]
pub struct CommitStamper {
    marker: String,
    excluded_dirs: Vec<String>,
}

impl CommitStamper {
    pub fn new(marker: impl Into<String>, excluded_dirs: Vec<String>) -> Self {
        Self {
            marker: marker.into(),
            excluded_dirs,
        }
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry.file_name().to_str().is_some_and(|name| {
                name == ".git" || self.excluded_dirs.iter().any(|ex| ex == name)
            })
    }

    /// Stamp every file under `root`; returns the files that changed
    ///
    /// Files that are not valid UTF-8 are left untouched.
    pub fn stamp(&self, root: &Path, commit: &str) -> Result<Vec<PathBuf>, DeployError> {
        let mut stamped = Vec::new();

        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| !self.is_excluded(entry));

        for entry in walker {
            let entry = entry.map_err(|e| DeployError::Stamp {
                path: e
                    .path()
                    .map_or_else(|| root.display().to_string(), |p| p.display().to_string()),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let bytes = std::fs::read(path).map_err(|e| stamp_error(path, e))?;
            let Ok(content) = String::from_utf8(bytes) else {
                continue;
            };
            if !content.contains(&self.marker) {
                continue;
            }

            std::fs::write(path, content.replace(&self.marker, commit))
                .map_err(|e| stamp_error(path, e))?;
            debug!("Stamped commit into {}", path.display());
            stamped.push(path.to_path_buf());
        }

        Ok(stamped)
    }
}

fn stamp_error(path: &Path, e: std::io::Error) -> DeployError {
    DeployError::Stamp {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
