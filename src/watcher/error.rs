//! Error types for file watching.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watch registration.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Cannot watch {}: file not found", path.display())]
    NotFound { path: PathBuf },

    #[error("Cannot watch {}: {reason}", path.display())]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Watcher has been shut down")]
    ChannelClosed,
}

impl WatchError {
    /// Whether this is a platform failure (OS watch primitive or thread
    /// creation) rather than a problem with the caller's path.
    pub fn is_platform(&self) -> bool {
        matches!(
            self,
            WatchError::PathWatchFailed { .. } | WatchError::InitFailed { .. }
        )
    }
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}
