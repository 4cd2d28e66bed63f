//! File change event and its identity-based filter.

use std::path::{Path, PathBuf};

use crate::events::{Event, EventFilter, ListenerResult};
use crate::path_key::{PathKey, normalize_absolute};

/// A watched file changed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWatchEvent {
    path: PathBuf,
    key: PathKey,
}

impl FileWatchEvent {
    pub fn new(path: impl Into<PathBuf>, key: PathKey) -> Self {
        Self {
            path: path.into(),
            key,
        }
    }

    /// The path the file was registered under (not necessarily the path the
    /// OS reported).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identity of the changed file.
    pub fn key(&self) -> &PathKey {
        &self.key
    }
}

impl Event for FileWatchEvent {}

/// Matches [`FileWatchEvent`]s for one file, whatever path spelling the
/// event carries.
///
/// The file's identity is resolved once, when the filter is built. An event
/// matches if it carries that identity or if its registered path names the
/// same location, so deletes and atomic replaces still reach the listener.
#[derive(Debug, Clone)]
pub struct FileWatchFilter {
    path: PathBuf,
    normalized: PathBuf,
    key: PathKey,
}

impl FileWatchFilter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let key = PathKey::resolve_lossy(&path);
        let normalized = normalize_absolute(&path);
        Self {
            path,
            normalized,
            key,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn matches(&self, event: &FileWatchEvent) -> bool {
        self.key == *event.key() || self.normalized == normalize_absolute(event.path())
    }
}

impl EventFilter<FileWatchEvent> for FileWatchFilter {
    fn handle(&self, callback: &dyn Fn(&FileWatchEvent), event: &FileWatchEvent) -> ListenerResult {
        if self.matches(event) {
            callback(event);
            ListenerResult::Handled
        } else {
            ListenerResult::PassThrough
        }
    }
}
