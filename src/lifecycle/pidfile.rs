//! Pid-file management.
//!
//! Written once at startup so the daemon can be killed easily; removed
//! only on graceful shutdown. A crash leaves the file behind on purpose,
//! since fault handling skips all cleanup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Handle to the daemon's pid-file.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current process id (decimal, newline-terminated).
    pub fn create(path: &Path) -> io::Result<Self> {
        fs::write(path, format!("{}\n", std::process::id()))?;
        tracing::debug!(path = %path.display(), pid = std::process::id(), "Pid-file written");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file. Called from the graceful-shutdown path only.
    pub fn remove(self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove pid-file");
        }
    }
}
