//! Working-tree file access.
//!
//! Thin wrapper over the directory a repository lives in. Paths handed to
//! and returned from this module are repository-relative, `/`-separated
//! strings, the same form used as keys in the staging area and commit trees.

use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

/// Root directory of a repository's working files.
#[derive(Debug, Clone)]
pub struct WorkTree {
    root: PathBuf,
}

impl WorkTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a repository-relative path.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    /// Names of the regular files directly under the root, sorted.
    ///
    /// Directories (including the metadata directory) are skipped; nested
    /// files are not visited. Names that are not valid UTF-8 are converted
    /// lossily, so they can never match a tracked path.
    pub fn plain_files(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            // Non-UTF-8 names are kept (lossily) so the untracked guard sees them.
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    pub fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path))
    }

    /// Write `bytes` to `path`, creating parent directories as needed.
    pub fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path, size = bytes.len(), "writing working file");
        std::fs::write(full, bytes)
    }

    /// Delete `path` if it is a regular file. Returns whether anything was
    /// removed.
    pub fn remove(&self, path: &str) -> io::Result<bool> {
        let full = self.resolve(path);
        if !full.is_file() {
            return Ok(false);
        }
        debug!(path, "deleting working file");
        std::fs::remove_file(full)?;
        Ok(true)
    }
}

/// Normalize a user-supplied path into repository-relative form.
///
/// `./` segments are dropped and separators become `/`. Returns `None` for
/// absolute paths, paths that climb out of the root, or empty paths.
pub fn normalize_path(path: &str) -> Option<String> {
    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_files_top_level_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/c.txt"), "c").unwrap();

        let tree = WorkTree::new(dir.path());
        assert_eq!(tree.plain_files().unwrap(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let tree = WorkTree::new(dir.path());
        tree.write("deep/nested/file.txt", b"hi").unwrap();
        assert_eq!(tree.read("deep/nested/file.txt").unwrap(), b"hi");
        assert!(tree.is_file("deep/nested/file.txt"));
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let tree = WorkTree::new(dir.path());
        assert!(!tree.remove("ghost.txt").unwrap());

        tree.write("real.txt", b"x").unwrap();
        assert!(tree.remove("real.txt").unwrap());
        assert!(!tree.is_file("real.txt"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("a.txt").as_deref(), Some("a.txt"));
        assert_eq!(normalize_path("./a.txt").as_deref(), Some("a.txt"));
        assert_eq!(normalize_path("dir/./b.txt").as_deref(), Some("dir/b.txt"));
        assert_eq!(normalize_path("../escape.txt"), None);
        assert_eq!(normalize_path("/etc/passwd"), None);
        assert_eq!(normalize_path("."), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_plain_files_lists_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(OsStr::from_bytes(b"bad\xff.txt")), "x").unwrap();
        std::fs::write(dir.path().join("ok.txt"), "y").unwrap();

        let names = WorkTree::new(dir.path()).plain_files().unwrap();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"bad\u{fffd}.txt".to_string()));
    }
}
