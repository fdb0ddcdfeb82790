//! Local disk storage for uploaded regression logs.
//!
//! Layout under the upload root:
//!
//! ```text
//! {root}/.staging/{uuid}/   files of an upload still being received
//! {root}/{run_id}/          files of a committed run
//! ```
//!
//! Uploads are staged first because the run id (and so the final directory)
//! only exists once the run row has been inserted.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

const STAGING_DIR: &str = ".staging";

/// Per-run log folders rooted at the configured upload directory.
#[derive(Debug, Clone)]
pub struct LogStore {
    root: PathBuf,
}

impl LogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload root and its staging area.
    pub async fn ensure_root(&self) -> AppResult<()> {
        tokio::fs::create_dir_all(self.root.join(STAGING_DIR))
            .await
            .map_err(|e| AppError::FileSystem(format!("Failed to create upload root: {}", e)))
    }

    /// Create a fresh staging directory for one upload.
    pub async fn create_staging(&self) -> AppResult<PathBuf> {
        let dir = self.root.join(STAGING_DIR).join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::FileSystem(format!("Failed to create staging directory: {}", e)))?;
        Ok(dir)
    }

    /// Directory holding the logs of a run.
    pub fn run_dir(&self, run_id: i64) -> PathBuf {
        self.root.join(run_id.to_string())
    }

    /// Move staged files into the run directory.
    ///
    /// On failure the partially filled run directory is removed; the staging
    /// directory is left for the caller to discard.
    pub async fn promote(&self, staging: &Path, run_id: i64, files: &[String]) -> AppResult<PathBuf> {
        let run_dir = self.run_dir(run_id);
        tokio::fs::create_dir_all(&run_dir)
            .await
            .map_err(|e| AppError::FileSystem(format!("Failed to create run directory: {}", e)))?;

        for name in files {
            if let Err(e) = tokio::fs::rename(staging.join(name), run_dir.join(name)).await {
                self.remove_dir(&run_dir).await;
                return Err(AppError::FileSystem(format!(
                    "Failed to move {} into run {}: {}",
                    name, run_id, e
                )));
            }
        }

        debug!(run_id, files = files.len(), "Promoted staged logs");
        Ok(run_dir)
    }

    /// Remove a directory tree, logging instead of failing.
    pub async fn remove_dir(&self, dir: &Path) {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!("Failed to remove {}: {}", dir.display(), e);
        }
    }

    /// Whether a log file exists in the run directory.
    pub async fn log_exists(&self, run_id: i64, file_name: &str) -> bool {
        tokio::fs::metadata(self.run_dir(run_id).join(file_name))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Read a log file of a run. `Ok(None)` when the file does not exist.
    pub async fn read_log(&self, run_id: i64, file_name: &str) -> AppResult<Option<Vec<u8>>> {
        if !is_plain_file_name(file_name) {
            return Err(AppError::InvalidInput(format!(
                "Invalid log file name '{}'",
                file_name
            )));
        }

        match tokio::fs::read(self.run_dir(run_id).join(file_name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::FileSystem(format!("Failed to read log: {}", e))),
        }
    }
}

/// Log file name of a component inside its run directory.
pub fn component_log_name(component: &str) -> String {
    format!("{}.txt", component)
}

/// Reduce a client-supplied file name to its final path component.
///
/// Returns `None` for names that cannot address a file inside the run
/// directory (empty, `.` or `..`).
pub fn safe_file_name(raw: &str) -> Option<String> {
    let normalized = raw.replace('\\', "/");
    let base = normalized.rsplit('/').next().unwrap_or_default().trim();
    match base {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

/// Whether `name` already is a single path component that [`safe_file_name`]
/// would keep unchanged. Path separators are never accepted here.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.contains(['/', '\\']) && safe_file_name(name).as_deref() == Some(name)
}
