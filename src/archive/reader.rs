//! Reading and extracting zip archives.

use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use super::backend::{Location, OpenedArchive, ReadSeek};
use super::entry_path::EntryPath;
use super::error::{ArchiveError, ArchiveResult, BulkFailure, EntryFailure};

const COPY_BUFFER: usize = 64 * 1024;

/// Reads entries from a zip archive in a file or in memory.
pub struct ZipReader {
    location: Location,
    archive: OpenedArchive,
}

impl ZipReader {
    /// Open an archive file.
    ///
    /// Fails with `Io` if the file cannot be opened and `Parse` if it is not
    /// a readable zip container.
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
        Self::from_source(
            Box::new(BufReader::new(file)),
            Location::File(path.to_path_buf()),
        )
    }

    /// Open an archive held in memory.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> ArchiveResult<Self> {
        Self::from_source(Box::new(Cursor::new(data.into())), Location::Memory)
    }

    pub(crate) fn from_source(source: Box<dyn ReadSeek>, location: Location) -> ArchiveResult<Self> {
        let archive = OpenedArchive::open(source, &location)?;
        crate::debug_event!(
            "unzip",
            "opened",
            "{} ({} entries)",
            location.describe(),
            archive.names().len()
        );
        Ok(Self { location, archive })
    }

    /// Path of the archive file, or `None` for in-memory archives.
    pub fn path(&self) -> Option<&Path> {
        self.location.path()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// All entry names as stored, directory markers included (with a
    /// trailing `/`), in central-directory order.
    pub fn entries(&self) -> Vec<String> {
        self.archive.names().to_vec()
    }

    pub fn len(&self) -> usize {
        self.archive.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.names().is_empty()
    }

    /// Whether the archive has an entry with this name, after the same
    /// normalization used when writing (`a//b.txt` finds `a/b.txt`).
    pub fn has_entry(&self, name: &str) -> bool {
        self.archive.find(name).is_some()
    }

    /// Read an entry into memory.
    pub fn extract(&mut self, name: &str) -> ArchiveResult<Vec<u8>> {
        let index = self.index_of(name)?;
        let entry = self.archive.names()[index].clone();

        self.archive.with_entry(index, |reader| {
            let mut data = Vec::new();
            reader
                .read_to_end(&mut data)
                .map_err(|e| ArchiveError::CorruptEntry {
                    entry,
                    reason: e.to_string(),
                })?;
            Ok(data)
        })
    }

    /// Extract an entry to `path`, creating parent directories.
    ///
    /// Data is written to a temporary file next to `path` and renamed into
    /// place, so a failed extraction never leaves a truncated file behind.
    /// Directory markers create the directory.
    pub fn extract_to(&mut self, name: &str, path: impl AsRef<Path>) -> ArchiveResult<()> {
        let index = self.index_of(name)?;
        self.extract_index_to(index, path.as_ref())
    }

    /// Extract every entry below `dir`, recreating the directory tree.
    ///
    /// Stops at the first failing entry. The error is
    /// [`ArchiveError::Bulk`] with the entries written so far and the one
    /// that failed. Entry names that would land outside `dir` are rejected.
    /// Returns the extracted entry names on success.
    pub fn extract_all_to(&mut self, dir: impl AsRef<Path>) -> ArchiveResult<Vec<String>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| ArchiveError::io(dir, e))?;

        let mut report = BulkFailure {
            completed: Vec::new(),
            failures: Vec::new(),
        };

        for index in 0..self.len() {
            let name = self.archive.names()[index].clone();
            match self.extract_entry_below(index, &name, dir) {
                Ok(()) => report.completed.push(name),
                Err(error) => {
                    tracing::warn!("[unzip] stopping at {name}: {error}");
                    report.failures.push(EntryFailure { entry: name, error });
                    break;
                }
            }
        }

        crate::log_event!(
            "unzip",
            "extracted",
            "{} entries from {} to {}",
            report.completed.len(),
            self.location.describe(),
            dir.display()
        );

        let completed = report.completed.clone();
        report.into_result(completed)
    }

    /// Extract the archive at `from` into `to`, optionally deleting the
    /// archive afterwards. The archive is only deleted if every entry was
    /// extracted; on a partial failure the entries already written stay on
    /// disk. Returns the extracted entry names.
    pub fn into_dir(
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
        delete_after: bool,
    ) -> ArchiveResult<Vec<String>> {
        let from = from.as_ref();
        let extracted = {
            let mut reader = Self::open(from)?;
            reader.extract_all_to(to)?
        };

        if delete_after {
            fs::remove_file(from).map_err(|e| ArchiveError::io(from, e))?;
            crate::debug_event!("unzip", "deleted", "{}", from.display());
        }

        Ok(extracted)
    }

    fn index_of(&self, name: &str) -> ArchiveResult<usize> {
        self.archive.find(name).ok_or_else(|| ArchiveError::NotFound {
            entry: name.to_string(),
        })
    }

    fn extract_entry_below(&mut self, index: usize, name: &str, dir: &Path) -> ArchiveResult<()> {
        let entry = EntryPath::parse(name)?;
        self.extract_index_to(index, &entry.to_host_path(dir))
    }

    fn extract_index_to(&mut self, index: usize, path: &Path) -> ArchiveResult<()> {
        if self.archive.is_dir(index) {
            return fs::create_dir_all(path).map_err(|e| ArchiveError::io(path, e));
        }

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;

        let entry = self.archive.names()[index].clone();
        let mut temp = NamedTempFile::new_in(parent).map_err(|e| ArchiveError::io(parent, e))?;

        self.archive.with_entry(index, |reader| {
            copy_entry(reader, temp.as_file_mut(), &entry, path)
        })?;

        // Dropping `temp` on any error above removes the partial file
        temp.persist(path)
            .map_err(|e| ArchiveError::io(path, e.error))?;

        crate::debug_event!("unzip", "wrote", "{entry} -> {}", path.display());
        Ok(())
    }
}

impl std::fmt::Debug for ZipReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipReader")
            .field("location", &self.location)
            .field("entries", &self.len())
            .finish()
    }
}

/// Copy an entry's bytes, telling decode failures (`CorruptEntry`) apart
/// from write failures (`Io`).
fn copy_entry(
    reader: &mut dyn Read,
    out: &mut File,
    entry: &str,
    destination: &Path,
) -> ArchiveResult<()> {
    let mut buffer = vec![0u8; COPY_BUFFER];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(ArchiveError::CorruptEntry {
                    entry: entry.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        out.write_all(&buffer[..read])
            .map_err(|e| ArchiveError::io(destination, e))?;
    }
    out.flush().map_err(|e| ArchiveError::io(destination, e))
}
