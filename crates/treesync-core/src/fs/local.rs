//! Disk-backed file system adapter.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use tracing::debug;

use crate::error::{OpError, Result};
use crate::filter::EntryFilter;
use crate::fs::FileSystem;

/// [`FileSystem`] over the real disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    /// Create a new adapter.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn last_modified(&self, path: &Path) -> Option<SystemTime> {
        fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    fn file_size(&self, path: &Path) -> u64 {
        fs::metadata(path)
            .map(|m| if m.is_file() { m.len() } else { 0 })
            .unwrap_or(0)
    }

    fn list_children(&self, path: &Path, filter: &dyn EntryFilter) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(path).map_err(|e| OpError::io(path, &e))?;
        let mut children = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => {
                    let child = entry.path();
                    if filter.accept(&child) {
                        children.push(child);
                    }
                }
                Err(err) => debug!(dir = %path.display(), %err, "skipping unreadable entry"),
            }
        }
        Ok(children)
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        fs::create_dir(path).map_err(|e| OpError::io(path, &e))
    }

    fn create_file(&self, path: &Path) -> Result<()> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map(|_| ())
            .map_err(|e| OpError::io(path, &e))
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<u64> {
        fs::copy(from, to).map_err(|e| OpError::io(from, &e))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).map_err(|e| OpError::io(from, &e))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let metadata = fs::symlink_metadata(path).map_err(|e| OpError::io(path, &e))?;
        let result = if metadata.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        result.map_err(|e| OpError::io(path, &e))
    }

    fn trash(&self, path: &Path) -> Result<()> {
        trash::delete(path).map_err(|e| OpError::failed(path, format!("Failed to trash: {e}")))
    }

    fn same_volume(&self, path: &Path, target_dir: &Path) -> bool {
        match (fs::symlink_metadata(path), fs::metadata(target_dir)) {
            (Ok(a), Ok(b)) => get_dev(&a) == get_dev(&b),
            _ => false,
        }
    }

    fn same_entry(&self, a: &Path, b: &Path) -> bool {
        match (fs::symlink_metadata(a), fs::symlink_metadata(b)) {
            (Ok(ma), Ok(mb)) => entry_id(a, &ma) == entry_id(b, &mb),
            _ => false,
        }
    }
}

/// Identity of an entry: device and inode on Unix.
#[cfg(unix)]
fn entry_id(_path: &Path, metadata: &fs::Metadata) -> Option<(u64, u64)> {
    Some((metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn entry_id(path: &Path, _metadata: &fs::Metadata) -> Option<PathBuf> {
    fs::canonicalize(path).ok()
}

/// Get the device ID from metadata.
#[cfg(unix)]
fn get_dev(metadata: &fs::Metadata) -> u64 {
    metadata.dev()
}

#[cfg(not(unix))]
fn get_dev(_metadata: &fs::Metadata) -> u64 {
    0 // Treated as one volume; rename failures fall back to copy.
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::AcceptAll;
    use tempfile::TempDir;

    #[test]
    fn test_list_and_filter() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        fs::write(temp.path().join(".hidden"), "h").unwrap();
        fs::create_dir(temp.path().join("dir")).unwrap();

        let fs = LocalFs::new();
        let mut all = fs.list_children(temp.path(), &AcceptAll).unwrap();
        all.sort();
        assert_eq!(all.len(), 3);

        let visible = fs
            .list_children(temp.path(), &|p: &Path| {
                !p.file_name().unwrap().to_string_lossy().starts_with('.')
            })
            .unwrap();
        assert_eq!(visible.len(), 2);
    }

    #[test]
    fn test_create_file_refuses_existing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("x");
        let fs = LocalFs::new();
        fs.create_file(&path).unwrap();
        let err = fs.create_file(&path).unwrap_err();
        assert!(matches!(err, OpError::AlreadyExists { .. }));
    }

    #[test]
    fn test_delete_directory_recursively() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("d");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("nested/f"), "x").unwrap();

        let fs = LocalFs::new();
        fs.delete(&dir).unwrap();
        assert!(!fs.exists(&dir));
    }

    #[test]
    fn test_same_volume_within_tempdir() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("f"), "x").unwrap();
        fs::create_dir(temp.path().join("d")).unwrap();
        let fs = LocalFs::new();
        assert!(fs.same_volume(&temp.path().join("f"), &temp.path().join("d")));
        assert!(!fs.same_volume(&temp.path().join("missing"), &temp.path().join("d")));
    }

    #[test]
    fn test_same_entry() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("one"), "1").unwrap();
        fs::write(temp.path().join("two"), "2").unwrap();
        let fs = LocalFs::new();

        let one = temp.path().join("one");
        assert!(fs.same_entry(&one, &one));
        assert!(!fs.same_entry(&one, &temp.path().join("two")));
        assert!(!fs.same_entry(&one, &temp.path().join("missing")));
    }

    #[test]
    fn test_missing_path_errors() {
        let temp = TempDir::new().unwrap();
        let fs = LocalFs::new();
        let err = fs
            .list_children(&temp.path().join("nope"), &AcceptAll)
            .unwrap_err();
        assert!(matches!(err, OpError::NotFound { .. }));
        assert_eq!(fs.file_size(&temp.path().join("nope")), 0);
    }
}
