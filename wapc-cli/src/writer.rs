//! Output file writing.
//!
//! Generated text is written to its configured path, creating parent
//! directories as needed. In dry-run mode nothing touches the disk and the
//! text is handed back for display instead.

use crate::error::WriteError;
use std::path::{Path, PathBuf};

/// Outcome of writing one generated output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// The file was written.
    Written {
        /// Destination path.
        path: PathBuf,
        /// Number of bytes written.
        bytes: usize,
    },
    /// Dry run: the content that would have been written.
    DryRun {
        /// Destination path.
        path: PathBuf,
        /// Generated content.
        content: String,
    },
}

/// Writes generated outputs, optionally as a dry run.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileWriter {
    dry_run: bool,
}

impl FileWriter {
    /// Create a writer; `dry_run` suppresses all disk writes.
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Whether this writer is in dry-run mode.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Write `content` to `path`.
    pub fn write(&self, path: &Path, content: &str) -> Result<WriteResult, WriteError> {
        if self.dry_run {
            return Ok(WriteResult::DryRun {
                path: path.to_path_buf(),
                content: content.to_string(),
            });
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| WriteError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path, content).map_err(|e| WriteError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        tracing::debug!(path = %path.display(), bytes = content.len(), "wrote output");
        Ok(WriteResult::Written {
            path: path.to_path_buf(),
            bytes: content.len(),
        })
    }
}

impl WriteResult {
    /// Destination path of this output.
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path, .. } | WriteResult::DryRun { path, .. } => path,
        }
    }

    /// Whether the file actually reached the disk.
    pub fn was_written(&self) -> bool {
        matches!(self, WriteResult::Written { .. })
    }
}
