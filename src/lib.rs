//! Zip archive building/extraction and identity-based file watching.
//!
//! The two halves are independent:
//!
//! - [`archive`]: [`ZipWriter`] and [`ZipReader`] over a file or an
//!   in-memory buffer, with an explicit writer-to-reader handoff.
//! - [`watcher`]: [`FileWatchRegistry`] posts [`FileWatchEvent`]s into an
//!   [`EventDispatcher`]; listeners match with [`FileWatchFilter`], which
//!   compares files by [`PathKey`] instead of path strings.
//!
//! [`picker`] defines the asynchronous file-picker contract over a pluggable
//! [`DialogBackend`].

pub mod archive;
pub mod cli;
pub mod config;
pub mod events;
pub mod logging;
pub mod path_key;
pub mod picker;
pub mod watcher;

pub use archive::{
    ArchiveError, ArchiveHandle, ArchiveResult, EntryPath, HandleMode, Location, ZipReader,
    ZipWriter,
};
pub use config::{AddAllRoot, ArchiveConfig, Compression, Settings, WatchConfig};
pub use events::{Event, EventDispatcher, EventFilter, ListenerId, ListenerResult};
pub use path_key::PathKey;
pub use picker::{DialogBackend, FilePickFilter, FilePickOptions, FilePicker, PickError, PickMode};
pub use watcher::{FileWatchEvent, FileWatchFilter, FileWatchRegistry, WatchError};
