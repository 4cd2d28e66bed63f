//! Zip archive creation and extraction.
//!
//! # Architecture
//!
//! ```text
//! ZipWriter --into_reader()--> ZipReader
//!   | StagedArchive              | OpenedArchive
//!   | (IndexMap of entries)      | (zip::ZipArchive + name index)
//!   +-- Location::File / Memory -+
//! ```
//!
//! [`ArchiveHandle`] wraps either side when the mode has to be carried as a
//! value. All archive-internal paths go through [`EntryPath`].

mod backend;
mod entry_path;
mod error;
mod handle;
mod reader;
mod writer;

pub use backend::Location;
pub use entry_path::EntryPath;
pub use error::{ArchiveError, ArchiveResult, BulkFailure, EntryFailure};
pub use handle::{ArchiveHandle, HandleMode};
pub use reader::ZipReader;
pub use writer::ZipWriter;
