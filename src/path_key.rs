//! Filesystem identity for paths.
//!
//! Two different path strings (`./a.txt`, `/work/a.txt`, a symlink) can name
//! the same file. [`PathKey`] captures what a path resolves to so callers can
//! compare files instead of strings.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Identity of a file on disk at the time the key was resolved.
///
/// On Unix this is the `(device, inode)` pair. Elsewhere, or when the file
/// cannot be stat'ed, it falls back to the canonical absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathKey {
    /// Device and inode numbers. Inode numbers are only unique per device.
    Inode { dev: u64, ino: u64 },
    /// Canonical (or lexically normalized) absolute path.
    Canonical(PathBuf),
}

impl PathKey {
    /// Resolve the identity of an existing file.
    ///
    /// Fails with the underlying I/O error if the file cannot be stat'ed,
    /// so `ErrorKind::NotFound` means the file does not exist.
    #[cfg(unix)]
    pub fn resolve(path: &Path) -> io::Result<Self> {
        use std::os::unix::fs::MetadataExt;
        let metadata = std::fs::metadata(path)?;
        Ok(Self::Inode {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    /// Resolve the identity of an existing file.
    #[cfg(not(unix))]
    pub fn resolve(path: &Path) -> io::Result<Self> {
        Ok(Self::Canonical(std::fs::canonicalize(path)?))
    }

    /// Resolve the identity of `path`, never failing.
    ///
    /// Missing files get a `Canonical` key built from the lexically
    /// normalized absolute path, which will not equal the `Inode` key the
    /// file had while it existed.
    pub fn resolve_lossy(path: &Path) -> Self {
        Self::resolve(path).unwrap_or_else(|_| {
            let canonical =
                std::fs::canonicalize(path).unwrap_or_else(|_| normalize_absolute(path));
            Self::Canonical(canonical)
        })
    }
}

/// Make `path` absolute and fold `.` and `..` components without touching
/// the filesystem.
pub fn normalize_absolute(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();

    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_same_file_different_spelling() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "x").unwrap();

        let dotted = temp_dir.path().join("sub").join("..").join("a.txt");
        fs::create_dir(temp_dir.path().join("sub")).unwrap();

        assert_eq!(
            PathKey::resolve(&file).unwrap(),
            PathKey::resolve(&dotted).unwrap()
        );
    }

    #[test]
    fn test_different_files_differ() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.txt");
        let b = temp_dir.path().join("b.txt");
        fs::write(&a, "same").unwrap();
        fs::write(&b, "same").unwrap();

        assert_ne!(PathKey::resolve(&a).unwrap(), PathKey::resolve(&b).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_resolves_to_target() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("target.txt");
        let link = temp_dir.path().join("link.txt");
        fs::write(&target, "x").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert_eq!(
            PathKey::resolve(&target).unwrap(),
            PathKey::resolve(&link).unwrap()
        );
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.txt");

        let err = PathKey::resolve(&missing).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        match PathKey::resolve_lossy(&missing) {
            PathKey::Canonical(path) => assert!(path.ends_with("missing.txt")),
            other => panic!("expected canonical key, got {other:?}"),
        }
    }

    #[test]
    fn test_normalize_absolute_folds_parent_dirs() {
        let normalized = normalize_absolute(Path::new("a/b/../c/./d.txt"));
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("a/c/d.txt"));
    }
}
