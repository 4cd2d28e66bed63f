//! Container state shared by the writer and reader.
//!
//! A writer keeps its entries staged in insertion order and serializes them
//! into a zip container on demand; a reader wraps an opened
//! [`zip::ZipArchive`] plus a normalized name index.

use std::collections::HashMap;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive};

use super::entry_path::{EntryPath, lookup_key};
use super::error::{ArchiveError, ArchiveResult};
use crate::config::{ArchiveConfig, Compression};

/// Where an archive lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    Memory,
}

impl Location {
    /// The backing file, or `None` for in-memory archives.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Location::File(path) => path.display().to_string(),
            Location::Memory => "<memory>".to_string(),
        }
    }
}

pub(crate) trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

#[derive(Debug, Clone)]
pub(crate) enum StagedEntry {
    File(Vec<u8>),
    Directory,
}

/// Entries added to a writer, keyed by normalized path.
#[derive(Debug, Default)]
pub(crate) struct StagedArchive {
    entries: IndexMap<EntryPath, StagedEntry>,
}

impl StagedArchive {
    /// Insert or overwrite a file entry. Returns `true` if it replaced one.
    pub fn insert_file(&mut self, path: EntryPath, data: Vec<u8>) -> bool {
        self.entries.insert(path, StagedEntry::File(data)).is_some()
    }

    pub fn insert_dir(&mut self, path: EntryPath) -> bool {
        self.entries.insert(path, StagedEntry::Directory).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, path: &EntryPath) -> bool {
        self.entries.contains_key(path)
    }

    /// Serialize every entry, in insertion order, into `sink`.
    pub fn write_to<W: Write + Seek>(&self, sink: W, config: &ArchiveConfig) -> ArchiveResult<W> {
        let file_options = file_options(config);
        let dir_options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(zip::DateTime::default());

        let mut zip = zip::ZipWriter::new(sink);
        for (path, entry) in &self.entries {
            match entry {
                StagedEntry::File(data) => {
                    zip.start_file(path.as_str(), file_options)
                        .map_err(finalize_error)?;
                    zip.write_all(data).map_err(|e| finalize_error(e.into()))?;
                }
                StagedEntry::Directory => {
                    zip.add_directory(path.dir_marker(), dir_options)
                        .map_err(finalize_error)?;
                }
            }
        }

        zip.finish().map_err(finalize_error)
    }
}

// Timestamps are pinned to the zip epoch so the same entries always produce
// the same bytes.
fn file_options(config: &ArchiveConfig) -> SimpleFileOptions {
    let options = SimpleFileOptions::default().last_modified_time(zip::DateTime::default());
    match config.compression {
        Compression::Deflated => options
            .compression_method(CompressionMethod::Deflated)
            .compression_level(config.compression_level),
        Compression::Stored => options.compression_method(CompressionMethod::Stored),
    }
}

fn finalize_error(err: ZipError) -> ArchiveError {
    ArchiveError::Finalize {
        reason: err.to_string(),
    }
}

/// An archive opened for reading.
pub(crate) struct OpenedArchive {
    archive: ZipArchive<Box<dyn ReadSeek>>,
    /// Raw entry names in central-directory order.
    names: Vec<String>,
    /// Normalized name -> index into `names`.
    index: HashMap<String, usize>,
}

impl OpenedArchive {
    pub fn open(source: Box<dyn ReadSeek>, location: &Location) -> ArchiveResult<Self> {
        let parse_error = |err: ZipError| ArchiveError::Parse {
            origin: location.describe(),
            reason: err.to_string(),
        };

        let mut archive = ZipArchive::new(source).map_err(parse_error)?;

        let mut names = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive.by_index_raw(i).map_err(parse_error)?;
            names.push(file.name().to_string());
        }

        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            // First occurrence wins, matching what most zip tools extract
            index.entry(lookup_key(name)).or_insert(i);
        }

        Ok(Self {
            archive,
            names,
            index,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.index.get(&lookup_key(name)).copied()
    }

    pub fn is_dir(&self, index: usize) -> bool {
        self.names[index].ends_with('/')
    }

    /// Run `read` against an entry's decompressing reader.
    ///
    /// Failing to locate or decode the entry header is reported as
    /// `CorruptEntry`; errors from `read` pass through unchanged.
    pub fn with_entry<T>(
        &mut self,
        index: usize,
        read: impl FnOnce(&mut dyn Read) -> ArchiveResult<T>,
    ) -> ArchiveResult<T> {
        let mut file = self
            .archive
            .by_index(index)
            .map_err(|err| ArchiveError::CorruptEntry {
                entry: self.names[index].clone(),
                reason: err.to_string(),
            })?;
        read(&mut file)
    }
}
