//! Archive-internal path normalization.
//!
//! Entry paths are relative, `/`-separated and never escape the archive
//! root. The same rule applies when writing, looking up and extracting, so
//! `a\b.txt`, `a//b.txt` and `./a/b.txt` all name the entry `a/b.txt`.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use super::error::{ArchiveError, ArchiveResult};

/// A validated, normalized entry path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryPath(String);

impl EntryPath {
    /// Normalize a caller-supplied entry path.
    ///
    /// `..` segments are folded lexically (`a/../b` is `b`); a `..` that
    /// would climb above the root is rejected, as are empty, absolute and
    /// drive-prefixed paths.
    pub fn parse(raw: &str) -> ArchiveResult<Self> {
        let normalized = normalize(raw).map_err(|reason| ArchiveError::invalid_entry(raw, reason))?;
        if normalized.is_empty() {
            return Err(ArchiveError::invalid_entry(raw, "empty path"));
        }
        Ok(Self(normalized))
    }

    /// Normalize a directory prefix. Unlike [`EntryPath::parse`], the empty
    /// string (archive root) is allowed and yields `None`.
    pub fn parse_dir(raw: &str) -> ArchiveResult<Option<Self>> {
        let normalized = normalize(raw).map_err(|reason| ArchiveError::invalid_entry(raw, reason))?;
        Ok((!normalized.is_empty()).then_some(Self(normalized)))
    }

    /// Append one or more `/`-separated segments.
    pub fn join(&self, child: &str) -> ArchiveResult<Self> {
        Self::parse(&format!("{}/{child}", self.0))
    }

    /// Entry path for `child` placed under an optional directory prefix.
    pub fn under(dir: Option<&EntryPath>, child: &str) -> ArchiveResult<Self> {
        match dir {
            Some(dir) => dir.join(child),
            None => Self::parse(child),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name used for a directory marker inside the zip container.
    pub fn dir_marker(&self) -> String {
        format!("{}/", self.0)
    }

    /// Map this entry onto the host filesystem below `root`.
    pub fn to_host_path(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |path, segment| path.join(segment))
    }

    /// Build an entry path from a relative host path, e.g. one produced by
    /// stripping a walk root.
    pub fn from_relative(path: &Path) -> ArchiveResult<Self> {
        let display = path.display().to_string();
        let mut segments = Vec::new();

        for component in path.components() {
            match component {
                Component::Normal(segment) => match segment.to_str() {
                    Some(segment) => segments.push(segment),
                    None => return Err(ArchiveError::invalid_entry(display, "not valid UTF-8")),
                },
                Component::CurDir => {}
                _ => return Err(ArchiveError::invalid_entry(display, "not a relative path")),
            }
        }

        Self::parse(&segments.join("/"))
    }
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntryPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Key used for lookups: the normalized form when the name is valid, the
/// raw name otherwise (so hostile names in foreign archives stay listable).
pub(crate) fn lookup_key(name: &str) -> String {
    normalize(name).unwrap_or_else(|_| name.to_string())
}

fn normalize(raw: &str) -> Result<String, &'static str> {
    if raw.contains('\0') {
        return Err("contains NUL byte");
    }
    if raw.starts_with('/') || raw.starts_with('\\') {
        return Err("absolute path");
    }
    if has_drive_prefix(raw) {
        return Err("drive prefix");
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err("escapes archive root");
                }
            }
            other => segments.push(other),
        }
    }

    Ok(segments.join("/"))
}

fn has_drive_prefix(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> String {
        EntryPath::parse(raw).unwrap().as_str().to_string()
    }

    fn rejected(raw: &str) -> &'static str {
        match EntryPath::parse(raw) {
            Err(ArchiveError::InvalidEntry { reason, .. }) => reason,
            other => panic!("expected InvalidEntry for {raw:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_normalizes_separators() {
        assert_eq!(parse("a/b.txt"), "a/b.txt");
        assert_eq!(parse("a//b.txt"), "a/b.txt");
        assert_eq!(parse("a\\b.txt"), "a/b.txt");
        assert_eq!(parse("./a/./b.txt"), "a/b.txt");
        assert_eq!(parse("dir/"), "dir");
    }

    #[test]
    fn test_folds_inner_parent_dirs() {
        assert_eq!(parse("a/../b.txt"), "b.txt");
        assert_eq!(parse("a/b/../../c"), "c");
    }

    #[test]
    fn test_rejects_escapes() {
        assert_eq!(rejected("../evil"), "escapes archive root");
        assert_eq!(rejected("a/../../evil"), "escapes archive root");
        assert_eq!(rejected("..\\evil"), "escapes archive root");
    }

    #[test]
    fn test_rejects_absolute_and_empty() {
        assert_eq!(rejected("/etc/passwd"), "absolute path");
        assert_eq!(rejected("\\share\\x"), "absolute path");
        assert_eq!(rejected("C:/Windows"), "drive prefix");
        assert_eq!(rejected(""), "empty path");
        assert_eq!(rejected("./"), "empty path");
        assert_eq!(rejected("a\0b"), "contains NUL byte");
    }

    #[test]
    fn test_parse_dir_allows_root() {
        assert_eq!(EntryPath::parse_dir("").unwrap(), None);
        assert_eq!(EntryPath::parse_dir(".").unwrap(), None);
        assert_eq!(
            EntryPath::parse_dir("res/").unwrap().unwrap().as_str(),
            "res"
        );
        assert!(EntryPath::parse_dir("..").is_err());
    }

    #[test]
    fn test_join_and_under() {
        let dir = EntryPath::parse("res").unwrap();
        assert_eq!(dir.join("img/logo.png").unwrap().as_str(), "res/img/logo.png");
        assert_eq!(
            EntryPath::under(Some(&dir), "a.txt").unwrap().as_str(),
            "res/a.txt"
        );
        assert_eq!(EntryPath::under(None, "a.txt").unwrap().as_str(), "a.txt");
        // Joining cannot climb out either
        assert!(dir.join("../../x").is_err());
    }

    #[test]
    fn test_dir_marker_and_host_path() {
        let entry = EntryPath::parse("a/b").unwrap();
        assert_eq!(entry.dir_marker(), "a/b/");
        assert_eq!(
            entry.to_host_path(Path::new("out")),
            Path::new("out").join("a").join("b")
        );
    }

    #[test]
    fn test_from_relative() {
        let rel = Path::new("sub").join("file.txt");
        assert_eq!(EntryPath::from_relative(&rel).unwrap().as_str(), "sub/file.txt");
        assert!(EntryPath::from_relative(Path::new("../x")).is_err());
    }

    #[test]
    fn test_lookup_key() {
        assert_eq!(lookup_key("a//b.txt"), "a/b.txt");
        assert_eq!(lookup_key("dir/"), "dir");
        assert_eq!(lookup_key("../evil"), "../evil");
    }
}
