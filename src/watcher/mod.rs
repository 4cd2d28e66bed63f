//! Per-file change watching with counted registrations.
//!
//! # Architecture
//!
//! ```text
//! FileWatchRegistry
//!   - WatchTable (PathKey -> OS path + registrations)
//!   - Box<dyn WatchBackend> (NotifyBackend in production)
//!         |
//!    crossbeam channel
//!         |
//!   "zipwatch-dispatch" thread
//!   - Debouncer (per PathKey)
//!   - posts FileWatchEvent to EventDispatcher
//!         |
//!    +---------+---------+
//!    |         |         |
//! listener  listener  listener   (each gated by a FileWatchFilter)
//! ```

mod backend;
mod debouncer;
mod error;
mod event;
mod registry;
mod table;

pub use backend::{ChangeSender, NotifyBackend, WatchBackend};
pub use error::WatchError;
pub use event::{FileWatchEvent, FileWatchFilter};
pub use registry::FileWatchRegistry;
