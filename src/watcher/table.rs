//! Watch table: one entry per watched file identity.
//!
//! Each entry remembers the OS-level path the watch was placed on and every
//! logical path it was registered under. The entry lives as long as at
//! least one registration does.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::path_key::PathKey;

#[derive(Debug)]
struct WatchEntry {
    /// Path handed to the OS watch primitive.
    os_path: PathBuf,
    /// One element per registration, oldest first.
    registrations: Vec<PathBuf>,
}

/// Result of removing one registration.
#[derive(Debug, PartialEq, Eq)]
pub enum Unregistered {
    /// Other registrations keep the watch alive.
    Remaining(usize),
    /// Last registration gone; the OS watch on this path must be removed.
    Removed(PathBuf),
}

#[derive(Debug, Default)]
pub struct WatchTable {
    entries: HashMap<PathKey, WatchEntry>,
    /// OS watch path -> identity, for notifications about files that can no
    /// longer be resolved (deleted or renamed away).
    by_os_path: HashMap<PathBuf, PathKey>,
}

impl WatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &PathKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Add a registration to an existing entry. Returns the new count, or
    /// `None` if the identity is not watched yet.
    pub fn add_registration(&mut self, key: &PathKey, logical: &Path) -> Option<usize> {
        let entry = self.entries.get_mut(key)?;
        entry.registrations.push(logical.to_path_buf());
        Some(entry.registrations.len())
    }

    /// Insert a new entry with its first registration.
    pub fn insert(&mut self, key: PathKey, logical: &Path, os_path: PathBuf) {
        self.by_os_path.insert(os_path.clone(), key.clone());
        self.entries.insert(
            key,
            WatchEntry {
                os_path,
                registrations: vec![logical.to_path_buf()],
            },
        );
    }

    /// Remove one registration, preferring one made under `logical`.
    pub fn remove_registration(&mut self, key: &PathKey, logical: &Path) -> Option<Unregistered> {
        let entry = self.entries.get_mut(key)?;

        let pos = entry
            .registrations
            .iter()
            .rposition(|p| p == logical)
            .unwrap_or(entry.registrations.len() - 1);
        entry.registrations.remove(pos);

        if !entry.registrations.is_empty() {
            return Some(Unregistered::Remaining(entry.registrations.len()));
        }

        let entry = self.entries.remove(key)?;
        self.by_os_path.remove(&entry.os_path);
        Some(Unregistered::Removed(entry.os_path))
    }

    /// Identity for a path that can no longer be resolved on disk, matched
    /// against the OS watch paths and the registered logical paths.
    pub fn find_unresolved(&self, path: &Path) -> Option<PathKey> {
        if let Some(key) = self.by_os_path.get(path) {
            return Some(key.clone());
        }
        self.entries
            .iter()
            .find(|(_, entry)| entry.registrations.iter().any(|p| p == path))
            .map(|(key, _)| key.clone())
    }

    /// Logical path of the oldest live registration.
    pub fn primary_path(&self, key: &PathKey) -> Option<&Path> {
        self.entries
            .get(key)
            .and_then(|entry| entry.registrations.first())
            .map(PathBuf::as_path)
    }

    pub fn count(&self, key: &PathKey) -> usize {
        self.entries
            .get(key)
            .map_or(0, |entry| entry.registrations.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Empty the table, returning every OS watch path that was live.
    pub fn drain(&mut self) -> Vec<PathBuf> {
        self.by_os_path.clear();
        self.entries.drain().map(|(_, entry)| entry.os_path).collect()
    }
}
