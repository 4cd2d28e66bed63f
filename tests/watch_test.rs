use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, unbounded};
use parking_lot::Mutex;
use tempfile::TempDir;
use zipwatch::config::WatchConfig;
use zipwatch::events::EventDispatcher;
use zipwatch::watcher::{
    ChangeSender, FileWatchEvent, FileWatchFilter, FileWatchRegistry, WatchBackend, WatchError,
};

/// Backend that counts OS watch calls and lets the test inject changes.
#[derive(Clone, Default)]
struct CountingBackend {
    watched: Arc<Mutex<HashMap<PathBuf, usize>>>,
    unwatched: Arc<Mutex<HashMap<PathBuf, usize>>>,
    sender: Arc<Mutex<Option<ChangeSender>>>,
}

impl CountingBackend {
    fn fire(&self, path: &Path) {
        let sender = self.sender.lock().clone().expect("backend not attached");
        sender.changed(vec![path.to_path_buf()]);
    }

    fn total_watched(&self) -> usize {
        self.watched.lock().values().sum()
    }

    fn total_unwatched(&self) -> usize {
        self.unwatched.lock().values().sum()
    }
}

impl WatchBackend for CountingBackend {
    fn watch(&mut self, path: &Path) -> Result<(), WatchError> {
        *self.watched.lock().entry(path.to_path_buf()).or_default() += 1;
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> Result<(), WatchError> {
        *self.unwatched.lock().entry(path.to_path_buf()).or_default() += 1;
        Ok(())
    }
}

fn counting_registry(debounce_ms: u64) -> (FileWatchRegistry, CountingBackend) {
    let backend = CountingBackend::default();
    let handle = backend.clone();
    let registry = FileWatchRegistry::with_backend(
        &WatchConfig { debounce_ms },
        EventDispatcher::new(),
        move |sender| {
            *backend.sender.lock() = Some(sender);
            Ok(backend)
        },
    )
    .unwrap();
    (registry, handle)
}

fn collect_events(registry: &FileWatchRegistry, path: &Path) -> Receiver<PathBuf> {
    let (tx, rx) = unbounded();
    registry
        .dispatcher()
        .listen(FileWatchFilter::new(path), move |event: &FileWatchEvent| {
            let _ = tx.send(event.path().to_path_buf());
        });
    rx
}

#[test]
fn test_os_watch_created_and_removed_once() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("watched.txt");
    fs::write(&file, "x").unwrap();
    fs::create_dir(temp_dir.path().join("sub")).unwrap();
    let other_spelling = temp_dir.path().join("sub").join("..").join("watched.txt");

    let (registry, backend) = counting_registry(0);

    registry.watch_file(&file).unwrap();
    registry.watch_file(&other_spelling).unwrap();
    registry.watch_file(&file).unwrap();

    assert_eq!(backend.total_watched(), 1);
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.watch_count(&file), 3);

    registry.unwatch_file(&file);
    registry.unwatch_file(&other_spelling);
    assert_eq!(backend.total_unwatched(), 0);
    assert!(registry.is_watching(&file));

    registry.unwatch_file(&file);
    assert_eq!(backend.total_unwatched(), 1);
    assert!(!registry.is_watching(&file));
    assert!(registry.is_empty());

    // Extra unwatch is a no-op
    registry.unwatch_file(&file);
    assert_eq!(backend.total_unwatched(), 1);
}

#[test]
fn test_dispatch_matches_by_identity() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("shared.txt");
    fs::write(&file, "x").unwrap();
    fs::create_dir(temp_dir.path().join("sub")).unwrap();
    let other_spelling = temp_dir.path().join("sub").join("..").join("shared.txt");

    let unrelated = temp_dir.path().join("unrelated.txt");
    fs::write(&unrelated, "y").unwrap();

    let (registry, backend) = counting_registry(0);
    registry.watch_file(&file).unwrap();

    let direct = collect_events(&registry, &file);
    let indirect = collect_events(&registry, &other_spelling);
    let other = collect_events(&registry, &unrelated);

    // Reported under the canonical OS path, not either registered spelling
    backend.fire(&fs::canonicalize(&file).unwrap());

    let timeout = Duration::from_secs(5);
    assert_eq!(direct.recv_timeout(timeout).unwrap(), file);
    assert_eq!(indirect.recv_timeout(timeout).unwrap(), file);
    assert!(other.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn test_no_delivery_after_unwatch() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("a.txt");
    fs::write(&file, "x").unwrap();

    // Long debounce keeps the change pending across the unwatch
    let (registry, backend) = counting_registry(200);
    registry.watch_file(&file).unwrap();
    let events = collect_events(&registry, &file);

    backend.fire(&file);
    registry.unwatch_file(&file);

    assert!(events.recv_timeout(Duration::from_millis(500)).is_err());
}

#[test]
fn test_burst_is_debounced() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("a.txt");
    fs::write(&file, "x").unwrap();

    let (registry, backend) = counting_registry(100);
    registry.watch_file(&file).unwrap();
    let events = collect_events(&registry, &file);

    for _ in 0..5 {
        backend.fire(&file);
    }

    assert!(events.recv_timeout(Duration::from_secs(5)).is_ok());
    assert!(events.recv_timeout(Duration::from_millis(300)).is_err());
}

#[test]
fn test_listener_may_unwatch_from_callback() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("a.txt");
    fs::write(&file, "x").unwrap();

    let (registry, backend) = counting_registry(0);
    let registry = Arc::new(registry);
    registry.watch_file(&file).unwrap();

    let (tx, rx) = unbounded();
    let inner = Arc::downgrade(&registry);
    let target = file.clone();
    registry
        .dispatcher()
        .listen(FileWatchFilter::new(&file), move |_: &FileWatchEvent| {
            if let Some(registry) = inner.upgrade() {
                registry.unwatch_file(&target);
                let _ = tx.send(registry.is_watching(&target));
            }
        });

    backend.fire(&file);
    assert!(!rx.recv_timeout(Duration::from_secs(5)).unwrap());
    assert_eq!(backend.total_unwatched(), 1);
}

#[test]
fn test_missing_file_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let (registry, backend) = counting_registry(0);

    let err = registry
        .watch_file(temp_dir.path().join("missing.txt"))
        .unwrap_err();
    assert!(matches!(err, WatchError::NotFound { .. }));
    assert!(!err.is_platform());
    assert_eq!(backend.total_watched(), 0);
}

#[test]
fn test_real_notify_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("live.txt");
    fs::write(&file, "before").unwrap();

    let registry =
        FileWatchRegistry::new(&WatchConfig { debounce_ms: 20 }, EventDispatcher::new()).unwrap();
    registry.watch_file(&file).unwrap();
    let events = collect_events(&registry, &file);

    // Give the OS watch a moment to settle before writing
    std::thread::sleep(Duration::from_millis(100));
    fs::write(&file, "after").unwrap();

    assert_eq!(events.recv_timeout(Duration::from_secs(10)).unwrap(), file);
}

#[test]
fn test_real_notify_delete_reaches_file_listener() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("doomed.txt");
    fs::write(&file, "short-lived").unwrap();

    let registry =
        FileWatchRegistry::new(&WatchConfig { debounce_ms: 20 }, EventDispatcher::new()).unwrap();
    registry.watch_file(&file).unwrap();
    let events = collect_events(&registry, &file);

    std::thread::sleep(Duration::from_millis(100));
    fs::remove_file(&file).unwrap();

    assert_eq!(events.recv_timeout(Duration::from_secs(10)).unwrap(), file);
}
