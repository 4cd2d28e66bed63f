//! Counted per-file watch registrations with identity-based dispatch.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, ReentrantMutex};

use crate::config::WatchConfig;
use crate::events::EventDispatcher;
use crate::path_key::{PathKey, normalize_absolute};

use super::backend::{ChangeSender, NotifyBackend, Signal, WatchBackend};
use super::debouncer::Debouncer;
use super::error::WatchError;
use super::event::FileWatchEvent;
use super::table::{Unregistered, WatchTable};

struct State {
    table: WatchTable,
    backend: Box<dyn WatchBackend>,
}

impl State {
    /// Identity a caller-supplied path refers to, if it is watched. Works
    /// for files that have since been deleted, as long as the path matches
    /// a registered spelling or the OS watch path.
    fn find_key(&self, path: &Path) -> Option<PathKey> {
        if let Ok(key) = PathKey::resolve(path) {
            if self.table.contains(&key) {
                return Some(key);
            }
        }
        self.table
            .find_unresolved(path)
            .or_else(|| self.table.find_unresolved(&normalize_absolute(path)))
    }
}

struct Shared {
    state: Mutex<State>,
    /// Held for the whole of one delivery. Unwatch takes it too, so it
    /// returns only once any in-flight delivery is over.
    dispatch_lock: ReentrantMutex<()>,
    dispatcher: EventDispatcher,
}

impl Shared {
    /// Map a path reported by the backend to a watched identity.
    fn resolve_reported(&self, path: &Path) -> Option<PathKey> {
        if let Some(key) = self.state.lock().table.find_unresolved(path) {
            return Some(key);
        }
        let key = PathKey::resolve(path).ok()?;
        self.state.lock().table.contains(&key).then_some(key)
    }

    fn deliver(&self, key: &PathKey) {
        let _dispatch = self.dispatch_lock.lock();

        let path = self
            .state
            .lock()
            .table
            .primary_path(key)
            .map(Path::to_path_buf);
        // Unwatched while the change was pending
        let Some(path) = path else {
            return;
        };

        let event = FileWatchEvent::new(path, key.clone());
        let handled = self.dispatcher.post(&event);
        crate::debug_event!(
            "watch",
            "changed",
            "{} ({handled} handled)",
            event.path().display()
        );
    }
}

/// Service object tracking which files are watched and how many times.
///
/// Registrations are counted per file identity ([`PathKey`]): watching one
/// file under several spellings creates a single OS watch, and the watch is
/// removed when the last registration goes away. Changes are posted as
/// [`FileWatchEvent`]s through the registry's [`EventDispatcher`] from a
/// dedicated dispatch thread.
pub struct FileWatchRegistry {
    shared: Arc<Shared>,
    sender: Sender<Signal>,
    dispatch_thread: Option<JoinHandle<()>>,
}

impl FileWatchRegistry {
    /// Registry backed by the platform's native watcher.
    pub fn new(config: &WatchConfig, dispatcher: EventDispatcher) -> Result<Self, WatchError> {
        Self::with_backend(config, dispatcher, NotifyBackend::new)
    }

    /// Registry over a custom backend. `make_backend` receives the handle the
    /// backend reports changes through.
    pub fn with_backend<B, F>(
        config: &WatchConfig,
        dispatcher: EventDispatcher,
        make_backend: F,
    ) -> Result<Self, WatchError>
    where
        B: WatchBackend + 'static,
        F: FnOnce(ChangeSender) -> Result<B, WatchError>,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        let backend = make_backend(ChangeSender::new(tx.clone()))?;

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                table: WatchTable::new(),
                backend: Box::new(backend),
            }),
            dispatch_lock: ReentrantMutex::new(()),
            dispatcher,
        });

        let debouncer = Debouncer::new(config.debounce_ms);
        let thread_shared = shared.clone();
        let dispatch_thread = thread::Builder::new()
            .name("zipwatch-dispatch".to_string())
            .spawn(move || run_dispatch(&thread_shared, &rx, debouncer))
            .map_err(|e| WatchError::InitFailed {
                reason: format!("failed to spawn dispatch thread: {e}"),
            })?;

        crate::debug_event!("watch", "started", "debounce {}ms", config.debounce_ms);

        Ok(Self {
            shared,
            sender: tx,
            dispatch_thread: Some(dispatch_thread),
        })
    }

    /// Dispatcher change events are posted to.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.shared.dispatcher
    }

    /// Register interest in `path`.
    ///
    /// The first registration of a file creates the OS watch; later ones,
    /// under any spelling of the same file, only bump its count.
    pub fn watch_file(&self, path: impl AsRef<Path>) -> Result<(), WatchError> {
        let path = path.as_ref();
        if self.dispatch_thread.is_none() {
            return Err(WatchError::ChannelClosed);
        }

        let key = PathKey::resolve(path).map_err(|e| path_error(path, e))?;

        let mut state = self.shared.state.lock();
        if let Some(count) = state.table.add_registration(&key, path) {
            crate::debug_event!("watch", "registered", "{} (count {count})", path.display());
            return Ok(());
        }

        let os_path = fs::canonicalize(path).map_err(|e| path_error(path, e))?;
        state.backend.watch(&os_path)?;
        state.table.insert(key, path, os_path);

        crate::log_event!("watch", "watching", "{}", path.display());
        Ok(())
    }

    /// Drop one registration of `path`. Unknown paths are ignored.
    ///
    /// When the last registration goes, the OS watch is removed before this
    /// returns, and no event for the file is delivered afterwards. Safe to
    /// call from a listener callback.
    pub fn unwatch_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let _dispatch = self.shared.dispatch_lock.lock();
        let mut state = self.shared.state.lock();

        let Some(key) = state.find_key(path) else {
            crate::debug_event!("watch", "not watched", "{}", path.display());
            return;
        };

        match state.table.remove_registration(&key, path) {
            Some(Unregistered::Remaining(count)) => {
                crate::debug_event!("watch", "unregistered", "{} (count {count})", path.display());
            }
            Some(Unregistered::Removed(os_path)) => {
                if let Err(e) = state.backend.unwatch(&os_path) {
                    tracing::warn!("[watch] failed to remove watch on {}: {e}", os_path.display());
                }
                crate::log_event!("watch", "unwatched", "{}", path.display());
            }
            None => {}
        }
    }

    pub fn is_watching(&self, path: impl AsRef<Path>) -> bool {
        self.shared.state.lock().find_key(path.as_ref()).is_some()
    }

    /// Number of live registrations for the file at `path`.
    pub fn watch_count(&self, path: impl AsRef<Path>) -> usize {
        let state = self.shared.state.lock();
        state
            .find_key(path.as_ref())
            .map_or(0, |key| state.table.count(&key))
    }

    /// Number of distinct files watched.
    pub fn len(&self) -> usize {
        self.shared.state.lock().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop the dispatch thread and remove every OS watch.
    ///
    /// Idempotent. Called from a listener callback, the dispatch thread is
    /// told to stop but not joined.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.dispatch_thread.take() else {
            return;
        };

        let _ = self.sender.send(Signal::Shutdown);
        if handle.thread().id() != thread::current().id() && handle.join().is_err() {
            tracing::error!("[watch] dispatch thread panicked");
        }

        let mut state = self.shared.state.lock();
        let released: Vec<PathBuf> = state.table.drain();
        for os_path in &released {
            if let Err(e) = state.backend.unwatch(os_path) {
                tracing::warn!("[watch] failed to remove watch on {}: {e}", os_path.display());
            }
        }
        crate::debug_event!("watch", "shutdown", "released {} watches", released.len());
    }
}

impl Drop for FileWatchRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for FileWatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatchRegistry")
            .field("watched", &self.len())
            .field("running", &self.dispatch_thread.is_some())
            .finish()
    }
}

fn path_error(path: &Path, error: io::Error) -> WatchError {
    if error.kind() == io::ErrorKind::NotFound {
        WatchError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        WatchError::PathWatchFailed {
            path: path.to_path_buf(),
            reason: error.to_string(),
        }
    }
}

fn run_dispatch(shared: &Shared, rx: &Receiver<Signal>, mut debouncer: Debouncer) {
    loop {
        let signal = match debouncer.next_deadline() {
            Some(wait) => match rx.recv_timeout(wait) {
                Ok(signal) => Some(signal),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(signal) => Some(signal),
                Err(_) => break,
            },
        };

        match signal {
            Some(Signal::Changed(paths)) => {
                for path in paths {
                    match shared.resolve_reported(&path) {
                        Some(key) => debouncer.record(key),
                        None => crate::debug_event!("watch", "unmatched", "{}", path.display()),
                    }
                }
            }
            Some(Signal::Error(reason)) => tracing::warn!("[watch] backend error: {reason}"),
            Some(Signal::Shutdown) => break,
            None => {}
        }

        for key in debouncer.take_ready() {
            shared.deliver(&key);
        }
    }
    crate::debug_event!("watch", "dispatch stopped");
}
