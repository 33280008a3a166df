//! File watcher for `generate --watch`.
//!
//! Watches an explicit set of files (the configuration file and the local
//! schemas it names) so generation can re-run whenever one of them changes.
//! Each file's directory is watched non-recursively and events for
//! unrelated siblings are dropped.

use crate::error::{CliResult, WatchError};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

/// Event types for file changes.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A watched file was written or created.
    Modified(PathBuf),
    /// A watched file was removed.
    Deleted(PathBuf),
    /// The underlying watcher reported an error.
    Error(String),
}

/// Watches a fixed set of files.
pub struct FileWatcher {
    files: Vec<PathBuf>,
    debounce_ms: u64,
}

impl FileWatcher {
    /// Create a watcher for `files`.
    pub fn new(files: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            files: files.into_iter().collect(),
            debounce_ms: 500,
        }
    }

    /// Set the debounce duration in milliseconds.
    pub fn with_debounce(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Files this watcher was created for.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Start watching.
    ///
    /// The debouncer must be kept alive for events to keep arriving.
    pub fn watch(&self) -> CliResult<(Debouncer<RecommendedWatcher>, Receiver<WatchEvent>)> {
        let targets = self.targets()?;
        let directories: BTreeSet<PathBuf> = targets
            .iter()
            .filter_map(|t| t.parent().map(Path::to_path_buf))
            .collect();

        let (tx, rx) = channel::<WatchEvent>();
        let filter = targets.clone();

        let mut debouncer = new_debouncer(
            Duration::from_millis(self.debounce_ms),
            move |result: Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    for event in events {
                        if !filter.contains(&event.path) {
                            continue;
                        }
                        let watch_event = if event.path.exists() {
                            WatchEvent::Modified(event.path)
                        } else {
                            WatchEvent::Deleted(event.path)
                        };
                        let _ = tx.send(watch_event);
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(e.to_string()));
                }
            },
        )
        .map_err(|e| WatchError::Init(e.to_string()))?;

        for directory in &directories {
            debouncer
                .watcher()
                .watch(directory, RecursiveMode::NonRecursive)
                .map_err(|e| WatchError::Notify(e.to_string()))?;
            tracing::debug!(directory = %directory.display(), "watching");
        }

        Ok((debouncer, rx))
    }

    /// Absolute paths events are matched against.
    fn targets(&self) -> Result<BTreeSet<PathBuf>, WatchError> {
        self.files.iter().map(|file| absolute_target(file)).collect()
    }
}

/// Canonical directory of `file` joined with its file name.
///
/// The file itself need not exist; its directory must.
fn absolute_target(file: &Path) -> Result<PathBuf, WatchError> {
    let name = file
        .file_name()
        .ok_or_else(|| WatchError::Init(format!("not a file path: {}", file.display())))?;
    let directory = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let directory = std::fs::canonicalize(directory)
        .map_err(|e| WatchError::Init(format!("{}: {e}", directory.display())))?;
    Ok(directory.join(name))
}

impl WatchEvent {
    /// Get the path associated with this event.
    pub fn path(&self) -> Option<&Path> {
        match self {
            WatchEvent::Modified(p) | WatchEvent::Deleted(p) => Some(p),
            WatchEvent::Error(_) => None,
        }
    }

    /// Check if this is an error event.
    pub fn is_error(&self) -> bool {
        matches!(self, WatchEvent::Error(_))
    }

    /// Get the error message if this is an error event.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            WatchEvent::Error(msg) => Some(msg),
            _ => None,
        }
    }
}
