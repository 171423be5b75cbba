//! Translation of kernel-facing paths to relative, directory-handle-rooted
//! paths.
//!
//! `fuser`'s low-level API hands us `(parent_ino, name)` pairs rather than
//! absolute path strings, so most of the dispatcher builds relative paths
//! directly by joining. This module exists for the one spot that still
//! needs the classic RELPATH rule spelled out: seeding the root inode's
//! path from the literal mountpoint root.

use std::path::{Path, PathBuf};

/// The relative path of the mount root itself.
pub const ROOT: &str = ".";

/// Apply the RELPATH rule: a single separator becomes ".", any other
/// leading separator is stripped, and an empty string becomes ".".
pub fn to_relative(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s.is_empty() || s == "/" {
        return PathBuf::from(ROOT);
    }
    match s.strip_prefix('/') {
        Some(stripped) if stripped.is_empty() => PathBuf::from(ROOT),
        Some(stripped) => PathBuf::from(stripped),
        None => PathBuf::from(s.as_ref()),
    }
}

/// Build the relative path of a child entry under `parent`.
pub fn child_path(parent: &Path, name: &std::ffi::OsStr) -> PathBuf {
    if parent == Path::new(ROOT) {
        PathBuf::from(name)
    } else {
        parent.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_becomes_dot() {
        assert_eq!(to_relative(Path::new("/")), PathBuf::from("."));
        assert_eq!(to_relative(Path::new("")), PathBuf::from("."));
    }

    #[test]
    fn leading_separator_is_stripped() {
        assert_eq!(to_relative(Path::new("/a/b")), PathBuf::from("a/b"));
    }

    #[test]
    fn child_path_under_root_has_no_leading_dot() {
        assert_eq!(
            child_path(Path::new("."), std::ffi::OsStr::new("file.txt")),
            PathBuf::from("file.txt")
        );
    }

    #[test]
    fn child_path_under_subdirectory_joins_normally() {
        assert_eq!(
            child_path(Path::new("sub"), std::ffi::OsStr::new("file.txt")),
            PathBuf::from("sub/file.txt")
        );
    }
}
