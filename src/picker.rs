//! Asynchronous file-picker contract.
//!
//! The OS dialog itself sits behind [`DialogBackend`]. [`FilePicker`] runs
//! a backend call on its own thread and reports the outcome through a
//! success or a failure callback, exactly one of which runs exactly once.

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use glob::{MatchOptions, Pattern};
use parking_lot::Mutex;
use thiserror::Error;

/// Kind of dialog to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickMode {
    OpenFile,
    SaveFile,
    OpenFolder,
}

/// Named set of file name patterns such as `*.txt`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePickFilter {
    pub description: String,
    pub files: BTreeSet<String>,
}

impl FilePickFilter {
    pub fn new<I, S>(description: impl Into<String>, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            description: description.into(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the file name of `path` matches any pattern. Matching is
    /// case-insensitive; malformed patterns never match.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };

        self.files.iter().any(|pattern| {
            Pattern::new(pattern).is_ok_and(|pattern| pattern.matches_with(name, options))
        })
    }
}

/// Constraints for one pick request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePickOptions {
    /// For file modes, the last component is taken as a file name unless it
    /// names an existing directory. For [`PickMode::OpenFolder`] the whole
    /// path leads to a directory.
    pub default_path: Option<PathBuf>,
    pub filters: Vec<FilePickFilter>,
}

impl FilePickOptions {
    pub fn with_default_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_path = Some(path.into());
        self
    }

    pub fn with_filter(mut self, filter: FilePickFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Whether `path` satisfies at least one filter. No filters accepts
    /// everything.
    pub fn accepts(&self, path: &Path) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|filter| filter.matches(path))
    }
}

/// Failure reported by a [`DialogBackend`].
#[derive(Error, Debug)]
pub enum PickError {
    #[error("Dialog was cancelled")]
    Cancelled,

    #[error("Dialog failed: {reason}")]
    Platform { reason: String },
}

/// Blocking OS dialog call.
pub trait DialogBackend: Send + Sync + 'static {
    fn pick_one(&self, mode: PickMode, options: &FilePickOptions) -> Result<PathBuf, PickError>;
    fn pick_many(&self, options: &FilePickOptions) -> Result<Vec<PathBuf>, PickError>;
}

type FailSlot = Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>;

/// Runs picks on background threads and delivers results to callbacks.
///
/// Results are passed through as the backend returns them; filters are
/// advisory to the dialog.
#[derive(Debug)]
pub struct FilePicker<B> {
    backend: Arc<B>,
}

impl<B> Clone for FilePicker<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

impl<B: DialogBackend> FilePicker<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Ask for one path. `on_pick` gets the chosen path; `on_fail` runs on
    /// cancellation or platform failure.
    pub fn pick_file(
        &self,
        mode: PickMode,
        options: FilePickOptions,
        on_pick: impl FnOnce(PathBuf) + Send + 'static,
        on_fail: impl FnOnce() + Send + 'static,
    ) {
        let backend = self.backend.clone();
        spawn_pick(on_fail, move || {
            backend.pick_one(mode, &options).map(|path| {
                crate::debug_event!("picker", "picked", "{}", path.display());
                move || on_pick(path)
            })
        });
    }

    /// Ask for several files to open. An empty selection counts as failure.
    pub fn pick_files(
        &self,
        options: FilePickOptions,
        on_pick: impl FnOnce(Vec<PathBuf>) + Send + 'static,
        on_fail: impl FnOnce() + Send + 'static,
    ) {
        let backend = self.backend.clone();
        spawn_pick(on_fail, move || {
            let paths = backend.pick_many(&options)?;
            if paths.is_empty() {
                return Err(PickError::Cancelled);
            }
            crate::debug_event!("picker", "picked", "{} files", paths.len());
            Ok(move || on_pick(paths))
        });
    }
}

/// Run `pick` on a named thread. On success the returned continuation runs;
/// on error, panic, or a failed spawn `on_fail` runs instead.
fn spawn_pick<P, S>(on_fail: impl FnOnce() + Send + 'static, pick: P)
where
    P: FnOnce() -> Result<S, PickError> + Send + 'static,
    S: FnOnce(),
{
    let slot: FailSlot = Arc::new(Mutex::new(Some(Box::new(on_fail))));
    let thread_slot = slot.clone();

    let spawned = thread::Builder::new()
        .name("zipwatch-picker".to_string())
        .spawn(move || {
            match panic::catch_unwind(AssertUnwindSafe(pick)) {
                Ok(Ok(deliver)) => deliver(),
                Ok(Err(e)) => {
                    crate::debug_event!("picker", "failed", "{e}");
                    fail(&thread_slot);
                }
                Err(_) => {
                    tracing::error!("[picker] dialog backend panicked");
                    fail(&thread_slot);
                }
            }
        });

    if let Err(e) = spawned {
        tracing::error!("[picker] failed to spawn picker thread: {e}");
        fail(&slot);
    }
}

fn fail(slot: &FailSlot) {
    let on_fail = slot.lock().take();
    if let Some(on_fail) = on_fail {
        on_fail();
    }
}
