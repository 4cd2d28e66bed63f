//! OS watch primitive behind a trait seam.
//!
//! The registry only needs "start watching this path" and "stop watching
//! this path". [`NotifyBackend`] implements that with `notify`; tests plug
//! in their own backend through [`FileWatchRegistry::with_backend`].
//!
//! [`FileWatchRegistry::with_backend`]: super::FileWatchRegistry::with_backend

use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::error::WatchError;

/// Message from a backend to the dispatch thread.
#[derive(Debug)]
pub(crate) enum Signal {
    Changed(Vec<PathBuf>),
    Error(String),
    Shutdown,
}

/// Handle a backend uses to report changes to the registry.
///
/// Cheap to clone; sending after the registry shut down is a silent no-op.
#[derive(Debug, Clone)]
pub struct ChangeSender {
    tx: Sender<Signal>,
}

impl ChangeSender {
    pub(crate) fn new(tx: Sender<Signal>) -> Self {
        Self { tx }
    }

    /// Report that the files at `paths` changed.
    pub fn changed(&self, paths: Vec<PathBuf>) {
        if !paths.is_empty() {
            let _ = self.tx.send(Signal::Changed(paths));
        }
    }

    /// Report a backend failure. It is logged by the dispatch thread.
    pub fn error(&self, reason: impl Into<String>) {
        let _ = self.tx.send(Signal::Error(reason.into()));
    }
}

/// Per-path OS watch primitive.
///
/// `watch` is called at most once per file identity while it is watched,
/// and `unwatch` exactly once when the last registration is removed.
pub trait WatchBackend: Send {
    fn watch(&mut self, path: &Path) -> Result<(), WatchError>;
    fn unwatch(&mut self, path: &Path) -> Result<(), WatchError>;
}

/// [`WatchBackend`] over `notify`'s recommended platform watcher.
pub struct NotifyBackend {
    watcher: RecommendedWatcher,
}

impl NotifyBackend {
    pub fn new(sender: ChangeSender) -> Result<Self, WatchError> {
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) if is_change(&event.kind) => sender.changed(event.paths),
                Ok(_) => {}
                Err(e) => sender.error(e.to_string()),
            }
        })?;
        Ok(Self { watcher })
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, path: &Path) -> Result<(), WatchError> {
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        crate::debug_event!("watch", "os watch", "{}", path.display());
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> Result<(), WatchError> {
        self.watcher
            .unwatch(path)
            .map_err(|e| WatchError::PathWatchFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        crate::debug_event!("watch", "os unwatch", "{}", path.display());
        Ok(())
    }
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend").finish_non_exhaustive()
    }
}

fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
