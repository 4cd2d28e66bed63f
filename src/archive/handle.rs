//! Mode-tagged ownership of an open archive.

use super::backend::Location;
use super::error::ArchiveResult;
use super::reader::ZipReader;
use super::writer::ZipWriter;

/// Whether a handle is building or reading its archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleMode {
    Writing,
    Reading,
}

/// An open archive in exactly one mode.
///
/// Handles are move-only. Switching from writing to reading consumes the
/// handle, so the container never has two live owners.
#[derive(Debug)]
pub enum ArchiveHandle {
    Writing(ZipWriter),
    Reading(ZipReader),
}

impl ArchiveHandle {
    pub fn mode(&self) -> HandleMode {
        match self {
            ArchiveHandle::Writing(_) => HandleMode::Writing,
            ArchiveHandle::Reading(_) => HandleMode::Reading,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            ArchiveHandle::Writing(writer) => writer.location(),
            ArchiveHandle::Reading(reader) => reader.location(),
        }
    }

    /// Finalize a writing handle and reopen it for reading. A reading handle
    /// is returned unchanged.
    pub fn into_reading(self) -> ArchiveResult<Self> {
        self.into_reader().map(ArchiveHandle::Reading)
    }

    pub fn into_reader(self) -> ArchiveResult<ZipReader> {
        match self {
            ArchiveHandle::Writing(writer) => writer.into_reader(),
            ArchiveHandle::Reading(reader) => Ok(reader),
        }
    }

    pub fn as_writer_mut(&mut self) -> Option<&mut ZipWriter> {
        match self {
            ArchiveHandle::Writing(writer) => Some(writer),
            ArchiveHandle::Reading(_) => None,
        }
    }

    pub fn as_reader_mut(&mut self) -> Option<&mut ZipReader> {
        match self {
            ArchiveHandle::Reading(reader) => Some(reader),
            ArchiveHandle::Writing(_) => None,
        }
    }
}

impl From<ZipWriter> for ArchiveHandle {
    fn from(writer: ZipWriter) -> Self {
        ArchiveHandle::Writing(writer)
    }
}

impl From<ZipReader> for ArchiveHandle {
    fn from(reader: ZipReader) -> Self {
        ArchiveHandle::Reading(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_handle_switches_mode() {
        let mut handle = ArchiveHandle::from(ZipWriter::in_memory());
        assert_eq!(handle.mode(), HandleMode::Writing);
        assert!(handle.as_reader_mut().is_none());

        handle.as_writer_mut().unwrap().add("a.txt", "a").unwrap();

        let mut handle = handle.into_reading().unwrap();
        assert_eq!(handle.mode(), HandleMode::Reading);
        assert_eq!(handle.location(), &Location::Memory);
        assert!(handle.as_writer_mut().is_none());

        let reader = handle.as_reader_mut().unwrap();
        assert_eq!(reader.extract("a.txt").unwrap(), b"a");

        // Reading handles pass through unchanged
        let handle = handle.into_reading().unwrap();
        assert_eq!(handle.mode(), HandleMode::Reading);
    }

    #[test]
    fn test_file_handle_reuses_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.zip");

        let mut writer = ZipWriter::create(&path).unwrap();
        writer.add("dir/a.txt", "a").unwrap();
        writer.add_folder("dir/empty").unwrap();

        let handle = ArchiveHandle::from(writer).into_reading().unwrap();
        assert_eq!(handle.location(), &Location::File(path.clone()));

        let mut reader = handle.into_reader().unwrap();
        assert_eq!(reader.entries(), vec!["dir/a.txt", "dir/empty/"]);
        assert_eq!(reader.extract("dir/a.txt").unwrap(), b"a");

        // The file on disk is complete as well
        let mut reopened = ZipReader::open(&path).unwrap();
        assert_eq!(reopened.extract("dir/a.txt").unwrap(), b"a");
    }
}
