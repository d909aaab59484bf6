//! Per-job staging directories.
//!
//! Each job works inside its own freshly created directory under the staging
//! root. The directory is removed when the job finishes, whether it succeeded,
//! failed, or was cancelled mid-flight (the guard releases on drop).

use crate::cookies::CookieJar;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// File name of the cookie jar written into a staging directory.
pub const COOKIE_FILE_NAME: &str = "cookies.txt";

/// Allocates staging directories under a common root.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a fresh, uniquely named directory for `job_id`.
    ///
    /// The name carries the job id plus a random suffix, so even a reused id
    /// never shares a directory with a live job.
    pub fn acquire(&self, job_id: Uuid) -> Result<StagingDir> {
        std::fs::create_dir_all(&self.root)?;
        let path = tempfile::Builder::new()
            .prefix(&format!("job-{}-", job_id))
            .tempdir_in(&self.root)?
            .keep();
        debug!("Acquired staging directory {:?}", path);
        Ok(StagingDir {
            path,
            released: false,
        })
    }
}

/// An exclusively owned staging directory.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
    released: bool,
}

impl StagingDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the cookie jar in line format and return its path.
    pub fn write_cookie_file(&self, jar: &CookieJar) -> Result<PathBuf> {
        let path = self.path.join(COOKIE_FILE_NAME);
        std::fs::write(&path, jar.render())?;
        Ok(path)
    }

    /// Remove everything inside the directory, then the directory itself.
    ///
    /// Best-effort and idempotent: individual failures are logged and skipped.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let entries = match std::fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!("Staging cleanup: cannot list {:?}: {}", self.path, e);
                return;
            }
        };

        for entry in entries.flatten() {
            let entry_path = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let removed = if is_dir {
                std::fs::remove_dir_all(&entry_path)
            } else {
                std::fs::remove_file(&entry_path)
            };
            if let Err(e) = removed {
                warn!("Staging cleanup: failed to remove {:?}: {}", entry_path, e);
            }
        }

        match std::fs::remove_dir(&self.path) {
            Ok(()) => debug!("Released staging directory {:?}", self.path),
            Err(e) => warn!("Staging cleanup: failed to remove {:?}: {}", self.path, e),
        }
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        self.release();
    }
}
