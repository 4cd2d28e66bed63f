//! Building zip archives.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::backend::{Location, StagedArchive};
use super::entry_path::EntryPath;
use super::error::{ArchiveError, ArchiveResult, BulkFailure, EntryFailure};
use super::reader::ZipReader;
use crate::config::{AddAllRoot, ArchiveConfig};

/// Builds a zip archive in a file or in memory.
///
/// Entries are staged as they are added and serialized when the archive is
/// finished (`finish`, drop, `into_reader`) or when `data` is called, so an
/// entry can be overwritten and a failed `add*` never corrupts what is
/// already there.
///
/// A file-backed writer that is dropped without `finish` still writes its
/// file; errors at that point can only be logged.
pub struct ZipWriter {
    location: Location,
    staged: StagedArchive,
    /// Open read/write handle for file-backed archives. `None` once the
    /// archive has been finalized or handed to a reader.
    sink: Option<File>,
    config: ArchiveConfig,
}

impl ZipWriter {
    /// Create (or truncate) a file-backed archive with default settings.
    pub fn create(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        Self::create_with(path, &ArchiveConfig::default())
    }

    /// Create (or truncate) a file-backed archive.
    pub fn create_with(path: impl AsRef<Path>, config: &ArchiveConfig) -> ArchiveResult<Self> {
        let path = path.as_ref();
        let sink = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| ArchiveError::io(path, e))?;

        crate::debug_event!("zip", "created", "{}", path.display());

        Ok(Self {
            location: Location::File(path.to_path_buf()),
            staged: StagedArchive::default(),
            sink: Some(sink),
            config: config.clone(),
        })
    }

    /// Start an in-memory archive with default settings.
    pub fn in_memory() -> Self {
        Self::in_memory_with(&ArchiveConfig::default())
    }

    /// Start an in-memory archive.
    pub fn in_memory_with(config: &ArchiveConfig) -> Self {
        Self {
            location: Location::Memory,
            staged: StagedArchive::default(),
            sink: None,
            config: config.clone(),
        }
    }

    /// Path of the archive file, or `None` when building in memory.
    pub fn path(&self) -> Option<&Path> {
        self.location.path()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Number of staged entries, directory markers included.
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.len() == 0
    }

    /// Whether an entry (file or directory marker) with this name is staged.
    pub fn has_entry(&self, name: &str) -> bool {
        EntryPath::parse(name).is_ok_and(|path| self.staged.contains(&path))
    }

    /// Add or overwrite an entry with exact contents.
    pub fn add(&mut self, entry: &str, data: impl Into<Vec<u8>>) -> ArchiveResult<()> {
        let path = EntryPath::parse(entry)?;
        self.stage_file(path, data.into());
        Ok(())
    }

    /// Add a file from disk as `<entry_dir>/<file name>`.
    ///
    /// Pass an empty `entry_dir` to place it at the archive root. To store it
    /// under a different name, read it yourself and use [`ZipWriter::add`].
    pub fn add_from(&mut self, file: impl AsRef<Path>, entry_dir: &str) -> ArchiveResult<()> {
        let file = file.as_ref();
        let dir = EntryPath::parse_dir(entry_dir)?;

        let name = file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ArchiveError::invalid_entry(file.display().to_string(), "no UTF-8 file name"))?;
        let path = EntryPath::under(dir.as_ref(), name)?;

        let data = fs::read(file).map_err(|e| ArchiveError::io(file, e))?;
        self.stage_file(path, data);
        Ok(())
    }

    /// Add a directory marker.
    pub fn add_folder(&mut self, entry: &str) -> ArchiveResult<()> {
        let path = EntryPath::parse(entry)?;
        crate::debug_event!("zip", "folder", "{path}");
        self.staged.insert_dir(path);
        Ok(())
    }

    /// Recursively add every file below `dir`.
    ///
    /// Entries are rooted according to `archive.add_all_root` (by default
    /// under the directory's own name). Directories are visited in file-name
    /// order, so the same tree always yields the same entry sequence, and
    /// empty directories become directory markers. An empty `dir` rooted
    /// under its own name yields just that name's marker.
    ///
    /// Unreadable files do not stop the walk. If any item failed, the error
    /// is [`ArchiveError::Bulk`] listing every failure; everything else has
    /// been added. On success returns the number of entries added.
    pub fn add_all_from(&mut self, dir: impl AsRef<Path>) -> ArchiveResult<usize> {
        let dir = dir.as_ref();
        let metadata = fs::metadata(dir).map_err(|e| ArchiveError::io(dir, e))?;
        if !metadata.is_dir() {
            return Err(ArchiveError::io(
                dir,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            ));
        }

        let root = self.walk_root(dir)?;
        let include_hidden = self.config.include_hidden;

        let mut report = BulkFailure {
            completed: Vec::new(),
            failures: Vec::new(),
        };
        // Relative directories that already have an entry below them
        let mut populated: HashSet<PathBuf> = HashSet::new();

        // contents_first: a directory is yielded after everything inside it,
        // which tells us whether it needs a marker.
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .follow_links(true)
            .contents_first(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                entry.depth() == 0 || include_hidden || !is_hidden(entry.file_name())
            });

        for item in walker {
            let entry = match item {
                Ok(entry) => entry,
                Err(err) => {
                    let failed = err.path().unwrap_or(dir).to_path_buf();
                    report.failures.push(EntryFailure {
                        entry: failed.display().to_string(),
                        error: ArchiveError::io(failed, err.into()),
                    });
                    continue;
                }
            };

            let relative = match entry.path().strip_prefix(dir) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => continue,
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                if populated.contains(&relative) {
                    continue;
                }
                match self.stage_relative_dir(root.as_ref(), &relative) {
                    Ok(name) => {
                        mark_ancestors(&mut populated, &relative);
                        report.completed.push(name);
                    }
                    Err(error) => report.failures.push(EntryFailure {
                        entry: entry.path().display().to_string(),
                        error,
                    }),
                }
            } else if file_type.is_file() {
                match self.stage_relative_file(root.as_ref(), &relative, entry.path()) {
                    Ok(name) => {
                        mark_ancestors(&mut populated, &relative);
                        report.completed.push(name);
                    }
                    Err(error) => report.failures.push(EntryFailure {
                        entry: entry.path().display().to_string(),
                        error,
                    }),
                }
            }
        }

        // An empty tree still keeps its root name as a marker
        if report.completed.is_empty() && report.failures.is_empty() {
            if let Some(root) = root {
                report.completed.push(root.dir_marker());
                self.staged.insert_dir(root);
            }
        }

        crate::log_event!(
            "zip",
            "added directory",
            "{}: {} entries, {} failures",
            dir.display(),
            report.completed.len(),
            report.failures.len()
        );

        let added = report.completed.len();
        report.into_result(added)
    }

    /// Serialize the archive as it stands into a complete zip buffer.
    ///
    /// Works for both in-memory and file-backed writers and does not end the
    /// writer; an empty writer yields a valid zero-entry archive.
    pub fn data(&self) -> ArchiveResult<Vec<u8>> {
        let cursor = self.staged.write_to(Cursor::new(Vec::new()), &self.config)?;
        Ok(cursor.into_inner())
    }

    /// Write a file-backed archive to disk and return where it lives.
    ///
    /// For in-memory writers this only ends the writer; use
    /// [`ZipWriter::data`] first to keep the bytes.
    pub fn finish(mut self) -> ArchiveResult<Location> {
        if let Some(file) = self.sink.take() {
            self.flush_to(file)?;
        }
        Ok(self.location.clone())
    }

    /// Finalize and reopen the same archive for reading.
    ///
    /// The writer is consumed, so the container is never owned by two
    /// handles at once. File-backed archives reuse the open file handle.
    pub fn into_reader(mut self) -> ArchiveResult<ZipReader> {
        let location = self.location.clone();
        match self.sink.take() {
            Some(file) => {
                let mut file = self.flush_to(file)?;
                file.seek(SeekFrom::Start(0))
                    .map_err(|e| ArchiveError::io(self.location.describe(), e))?;
                ZipReader::from_source(Box::new(BufReader::new(file)), location)
            }
            None => {
                let data = self.data()?;
                ZipReader::from_source(Box::new(Cursor::new(data)), location)
            }
        }
    }

    fn stage_file(&mut self, path: EntryPath, data: Vec<u8>) {
        let size = data.len();
        if self.staged.insert_file(path.clone(), data) {
            crate::debug_event!("zip", "replaced", "{path} ({size} bytes)");
        } else {
            crate::debug_event!("zip", "added", "{path} ({size} bytes)");
        }
    }

    fn stage_relative_file(
        &mut self,
        root: Option<&EntryPath>,
        relative: &Path,
        disk_path: &Path,
    ) -> ArchiveResult<String> {
        let path = join_relative(root, relative)?;
        let data = fs::read(disk_path).map_err(|e| ArchiveError::io(disk_path, e))?;
        let name = path.as_str().to_string();
        self.stage_file(path, data);
        Ok(name)
    }

    fn stage_relative_dir(&mut self, root: Option<&EntryPath>, relative: &Path) -> ArchiveResult<String> {
        let path = join_relative(root, relative)?;
        let name = path.dir_marker();
        self.staged.insert_dir(path);
        Ok(name)
    }

    fn walk_root(&self, dir: &Path) -> ArchiveResult<Option<EntryPath>> {
        if self.config.add_all_root == AddAllRoot::ArchiveRoot {
            return Ok(None);
        }

        // `.` and `..` have no file name of their own
        let named = dir
            .file_name()
            .map(|name| name.to_os_string())
            .or_else(|| fs::canonicalize(dir).ok()?.file_name().map(|n| n.to_os_string()));

        match named {
            Some(name) => {
                let name = name.to_str().ok_or_else(|| {
                    ArchiveError::invalid_entry(dir.display().to_string(), "no UTF-8 directory name")
                })?;
                EntryPath::parse(name).map(Some)
            }
            // Filesystem root: nothing to nest under
            None => Ok(None),
        }
    }

    fn flush_to(&mut self, file: File) -> ArchiveResult<File> {
        let location = self.location.describe();
        let io_error = |e| ArchiveError::io(&location, e);

        let mut file = file;
        file.set_len(0).map_err(io_error)?;
        file.seek(SeekFrom::Start(0)).map_err(io_error)?;

        let writer = self.staged.write_to(BufWriter::new(file), &self.config)?;
        let mut file = writer
            .into_inner()
            .map_err(|e| ArchiveError::io(&location, e.into_error()))?;
        file.flush().map_err(io_error)?;

        crate::log_event!("zip", "written", "{location} ({} entries)", self.staged.len());
        Ok(file)
    }
}

impl Drop for ZipWriter {
    fn drop(&mut self) {
        if let Some(file) = self.sink.take() {
            if let Err(e) = self.flush_to(file) {
                tracing::error!("[zip] failed to write {} on drop: {e}", self.location.describe());
            }
        }
    }
}

impl std::fmt::Debug for ZipWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipWriter")
            .field("location", &self.location)
            .field("entries", &self.staged.len())
            .field("finished", &self.sink.is_none())
            .finish()
    }
}

fn join_relative(root: Option<&EntryPath>, relative: &Path) -> ArchiveResult<EntryPath> {
    let relative = EntryPath::from_relative(relative)?;
    EntryPath::under(root, relative.as_str())
}

fn mark_ancestors(populated: &mut HashSet<PathBuf>, relative: &Path) {
    for ancestor in relative.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() || !populated.insert(ancestor.to_path_buf()) {
            break;
        }
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|name| name.starts_with('.'))
}
