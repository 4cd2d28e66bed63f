//! Error types for archive operations.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from archive writing and reading.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid archive {origin}: {reason}")]
    Parse { origin: String, reason: String },

    #[error("Entry '{entry}' is corrupt: {reason}")]
    CorruptEntry { entry: String, reason: String },

    #[error("Entry '{entry}' not found")]
    NotFound { entry: String },

    #[error("Invalid entry path '{entry}': {reason}")]
    InvalidEntry { entry: String, reason: &'static str },

    #[error("Failed to write archive: {reason}")]
    Finalize { reason: String },

    #[error(transparent)]
    Bulk(Box<BulkFailure>),
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_entry(entry: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidEntry {
            entry: entry.into(),
            reason,
        }
    }

    /// The bulk report, if this error came from a multi-entry operation.
    pub fn as_bulk(&self) -> Option<&BulkFailure> {
        match self {
            Self::Bulk(report) => Some(report),
            _ => None,
        }
    }
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// One failed item of a bulk operation.
#[derive(Debug)]
pub struct EntryFailure {
    /// Entry name, or the disk path when no entry name could be derived.
    pub entry: String,
    pub error: ArchiveError,
}

/// Outcome of a bulk operation (`add_all_from`, `extract_all_to`) that did
/// not fully succeed. Completed items stay in the archive or on disk.
#[derive(Debug)]
pub struct BulkFailure {
    pub completed: Vec<String>,
    /// Never empty.
    pub failures: Vec<EntryFailure>,
}

impl BulkFailure {
    pub(crate) fn into_result<T>(self, ok: T) -> ArchiveResult<T> {
        if self.failures.is_empty() {
            Ok(ok)
        } else {
            Err(ArchiveError::Bulk(Box::new(self)))
        }
    }

    /// Names of the failed items, in the order they were hit.
    pub fn failed_entries(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.entry.as_str())
    }
}

impl fmt::Display for BulkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.failures.len();
        let total = failed + self.completed.len();
        write!(f, "{failed} of {total} entries failed")?;
        if let Some(first) = self.failures.first() {
            write!(f, "; first: {}: {}", first.entry, first.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for BulkFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|f| &f.error as &(dyn std::error::Error + 'static))
    }
}
